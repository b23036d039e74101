//! Self-describing tagged binary codec for cached records.
//!
//! A record is a flat stream of `(key, payload)` pairs where
//! `key = field_number << 3 | wire_type`, encoded as a varint. There is no
//! header, magic number or version: cache freshness lives in filesystem
//! metadata, not in the bytes.
//!
//! # Sequence Layout
//!
//! ```text
//! +------------------------------+
//! | key(SEQUENCE_TAG, LEN)       |  varint
//! | element length               |  varint
//! | element 0 fields             |  variable
//! +------------------------------+
//! | key(SEQUENCE_TAG, LEN)       |
//! | element length               |
//! | element 1 fields             |
//! +------------------------------+
//! |            ...               |
//! +------------------------------+
//! ```
//!
//! The reader loops until end of input; a key that is not the sequence tag
//! is a [`DecodeError::Protocol`](crate::DecodeError::Protocol) failure.

mod format;
mod reader;
mod record;
mod writer;

#[cfg(test)]
mod tests;

pub use format::*;
pub use reader::{decode, decode_sequence, RecordReader};
pub use record::{FieldValue, RawRecord, Record};
pub use writer::{encode, encode_sequence, RecordWriter, SequenceWriter};
