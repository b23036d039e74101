//! Error types for stashguard.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for stashguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache file failed to decode and has been deleted
    #[error("corrupt cache file {path:?}: {source}")]
    CorruptCache {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// Bytes failed to decode outside of the cache store
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Rule database error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Rule database migration error
    #[error("migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    /// Malformed block rule
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// No persisted rule with this id
    #[error("rule not found: {0}")]
    RuleNotFound(i64),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from unreadable cache contents.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CorruptCache { .. } | Error::Decode(_))
    }
}

/// Result type alias for stashguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for codec decode operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended in the middle of a key or payload
    #[error("unexpected end of input at offset {offset}")]
    Truncated { offset: usize },

    /// Varint longer than 10 bytes
    #[error("varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    /// Wire type bits outside the supported set
    #[error("unknown wire type {wire_type} for field {field}")]
    UnknownWireType { field: u32, wire_type: u8 },

    /// Field number 0 or above the maximum
    #[error("invalid field number {0}")]
    InvalidField(u64),

    /// The adapter does not expect this field
    #[error("unexpected field {field} with wire type {wire_type}")]
    UnexpectedField { field: u32, wire_type: u8 },

    /// String payload is not UTF-8
    #[error("invalid UTF-8 in field {field}")]
    InvalidUtf8 { field: u32 },

    /// Required field absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but its value is out of range
    #[error("invalid value for field {field}: {reason}")]
    InvalidValue { field: u32, reason: String },

    /// A sequence element was not introduced by the sequence tag
    #[error("protocol error: unknown tag {field} (wire type {wire_type}) in sequence")]
    Protocol { field: u32, wire_type: u8 },
}

impl DecodeError {
    /// Whether this is a sequence framing failure.
    pub fn is_protocol(&self) -> bool {
        matches!(self, DecodeError::Protocol { .. })
    }
}
