//! Stashguard - durable record caching and block-list moderation.
//!
//! This crate provides two small, independent subsystems that feed content
//! screens:
//!
//! - A file-backed cache of encoded records with per-read TTL freshness and
//!   automatic recovery from corrupted entries.
//! - A moderation engine over user-defined block rules, where any matching
//!   whitelist rule overrides every matching blacklist rule.
//!
//! # Features
//!
//! - **Tagged binary codec**: self-describing field stream, framed sequences
//! - **TTL by mtime**: freshness comes from file metadata, never from contents
//! - **Self-healing cache**: undecodable files are deleted as they are detected
//! - **Atomic writes**: temp file plus rename, no torn entries
//! - **Durable rules**: SQLite persistence with a lock-free in-memory mirror
//! - **Replay-latest notifications**: new subscribers get the current rules first
//!
//! # Quick Start
//!
//! ```
//! use stashguard::{BlockRule, CacheStore, Category, RuleStore};
//!
//! # fn main() -> stashguard::Result<()> {
//! # let dir = tempfile::tempdir()?;
//! let cache = CacheStore::new(dir.path());
//! let path = cache.entry_path("titles", "post:1")?;
//! cache.write(&path, &"hello".to_string())?;
//! let title: Option<String> = cache.read(&path, None)?;
//! assert_eq!(title.as_deref(), Some("hello"));
//!
//! let rules = RuleStore::open_in_memory()?;
//! rules.initialize()?;
//! rules.add(BlockRule::keyword("spoiler", Category::Blacklist)?);
//! rules.add(BlockRule::user(7, Category::Whitelist));
//!
//! assert!(rules.should_block(1, &["big spoiler"]));
//! assert!(!rules.should_block(7, &["big spoiler"]));
//! # Ok(())
//! # }
//! ```
//!
//! # Error Model
//!
//! A cache miss or an expired entry is `Ok(None)`, not an error. Undecodable
//! bytes surface as [`Error::CorruptCache`] after the file has been deleted,
//! so the next read is a plain miss. Rule persistence failures leave the
//! in-memory rules untouched.

mod config;
mod error;

pub mod cache;
pub mod codec;
pub mod moderation;
pub mod publisher;
pub mod rule;
pub mod ruleset;
pub mod store;

// Re-export core types
pub use config::{CacheConfig, Config, RulesConfig, APP_DIR_NAME};
pub use error::{DecodeError, Error, Result};

// Re-export cache and codec entry points
pub use cache::CacheStore;
pub use codec::{decode, decode_sequence, encode, encode_sequence, RawRecord, Record};

// Re-export rule types
pub use rule::{BlockRule, Category, RuleKind};
pub use ruleset::RuleSet;

// Re-export moderation
pub use moderation::{retain_visible, should_block, Moderated};

// Re-export store and publisher
pub use publisher::{RulePublisher, RuleSetStream};
pub use store::{RuleStorage, RuleStore, SqliteRuleStorage};
