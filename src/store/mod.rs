//! Durable rule store with an in-memory mirror.
//!
//! Every mutation follows the same order: durable write, then mirror update,
//! then publication. A failed durable write leaves the mirror and the
//! published snapshot untouched, so no rule is ever visible that would be
//! lost on restart.
//!
//! Mutations and [`RuleStore::initialize`] block on disk I/O; async callers
//! should run them on a blocking thread (`tokio::task::spawn_blocking`).
//! [`RuleStore::snapshot`] and [`RuleStore::should_block`] never block.

mod migrations;
mod storage;

pub use storage::{RuleStorage, SqliteRuleStorage};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::Path;

use crate::config::RulesConfig;
use crate::error::Result;
use crate::moderation;
use crate::publisher::{RulePublisher, RuleSetStream};
use crate::rule::BlockRule;
use crate::ruleset::RuleSet;

/// Rule store: persistence plus a published, copy-on-write mirror.
///
/// # Example
///
/// ```
/// use stashguard::{BlockRule, Category, RuleStore};
///
/// let store = RuleStore::open_in_memory().unwrap();
/// store.initialize().unwrap();
///
/// assert!(store.add(BlockRule::user(42, Category::Blacklist)));
/// assert!(store.should_block(42, &[]));
/// assert!(!store.should_block(7, &[]));
/// ```
pub struct RuleStore<S = SqliteRuleStorage> {
    storage: S,
    publisher: RulePublisher,
    /// Serializes mutations; readers never take it
    writer: Mutex<()>,
    initialized: OnceCell<()>,
}

impl RuleStore<SqliteRuleStorage> {
    /// Store backed by a SQLite database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SqliteRuleStorage::open(path)?))
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteRuleStorage::open_in_memory()?))
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        Ok(Self::new(SqliteRuleStorage::from_config(config)?))
    }
}

impl<S: RuleStorage> RuleStore<S> {
    /// Wrap a storage backend. The mirror starts empty until
    /// [`initialize`](Self::initialize) loads it.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            publisher: RulePublisher::default(),
            writer: Mutex::new(()),
            initialized: OnceCell::new(),
        }
    }

    /// Load all persisted rules into the mirror.
    ///
    /// Runs at most once; later calls return immediately. Evaluations before
    /// this completes see an empty rule set and block nothing. A failed load
    /// leaves the store uninitialized so the call can be retried.
    pub fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| {
                let _guard = self.writer.lock();
                let rules = self.storage.load_all().map_err(|e| {
                    log::error!("Failed to load block rules: {}", e);
                    e
                })?;
                log::info!("Loaded {} block rules", rules.len());
                self.publisher.publish(RuleSet::new(rules));
                Ok(())
            })
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Persist `rule` and publish it. Returns `false` when the rule is invalid
    /// or persistence fails, in which case nothing changes in memory.
    pub fn add(&self, rule: BlockRule) -> bool {
        self.try_add(rule).is_ok()
    }

    /// Persist `rule` and publish it, returning the stored rule with its id.
    pub fn try_add(&self, rule: BlockRule) -> Result<BlockRule> {
        check_rule(&rule)?;
        let _guard = self.writer.lock();
        let stored = self.storage.insert(&rule).map_err(|e| {
            log::error!("Failed to persist rule {}: {}", rule.kind, e);
            e
        })?;
        log::debug!("Added rule {}", stored);
        self.publisher
            .publish(self.publisher.snapshot().with_rule(stored.clone()));
        Ok(stored)
    }

    /// Insert or update a rule.
    ///
    /// A persisted rule (`id > 0`) overwrites its row. Otherwise an existing
    /// rule with the same kind and value takes the new category and label,
    /// and only when there is none is a new row inserted.
    pub fn upsert(&self, rule: BlockRule) -> Result<BlockRule> {
        check_rule(&rule)?;
        let _guard = self.writer.lock();
        let stored = self.upsert_durable(rule).map_err(|e| {
            log::error!("Failed to save rule: {}", e);
            e
        })?;
        log::debug!("Saved rule {}", stored);
        self.publisher
            .publish(self.publisher.snapshot().with_replaced(stored.clone()));
        Ok(stored)
    }

    fn upsert_durable(&self, rule: BlockRule) -> Result<BlockRule> {
        if rule.is_persisted() {
            self.storage.update(&rule)?;
            return Ok(rule);
        }
        match self.storage.find(&rule.kind)? {
            Some(existing) => {
                let updated = rule.with_id(existing.id);
                self.storage.update(&updated)?;
                Ok(updated)
            }
            None => self.storage.insert(&rule),
        }
    }

    /// Delete the rule with `id` from storage, then from the mirror.
    ///
    /// Removing an id that does not exist is not an error. When the durable
    /// delete fails the mirror keeps the rule and the error is returned.
    pub fn remove(&self, id: i64) -> Result<()> {
        let _guard = self.writer.lock();
        let existed = self.storage.delete(id).map_err(|e| {
            log::error!("Failed to delete rule #{}: {}", id, e);
            e
        })?;
        if !existed {
            log::debug!("Rule #{} was not persisted", id);
        }
        self.publisher
            .publish(self.publisher.snapshot().without_id(id));
        Ok(())
    }

    /// Delete every rule.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.writer.lock();
        let removed = self.storage.clear().map_err(|e| {
            log::error!("Failed to clear rules: {}", e);
            e
        })?;
        log::info!("Cleared {} block rules", removed);
        self.publisher.publish(RuleSet::empty());
        Ok(())
    }

    /// Current rules. Never blocks.
    pub fn snapshot(&self) -> RuleSet {
        self.publisher.snapshot()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn observe(&self) -> RuleSetStream {
        self.publisher.subscribe()
    }

    pub fn publisher(&self) -> &RulePublisher {
        &self.publisher
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Whether a keyword rule with exactly this text exists.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.snapshot().has_keyword(keyword)
    }

    /// First rule targeting user `uid`.
    pub fn find_user(&self, uid: i64) -> Option<BlockRule> {
        self.snapshot().find_user(uid).cloned()
    }

    /// Evaluate the current snapshot.
    pub fn should_block(&self, subject: i64, texts: &[&str]) -> bool {
        moderation::should_block(&self.snapshot(), subject, texts)
    }
}

fn check_rule(rule: &BlockRule) -> Result<()> {
    rule.kind.validate().map_err(|e| {
        log::error!("Refusing to persist rule: {}", e);
        e
    })
}

impl<S> std::fmt::Debug for RuleStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("publisher", &self.publisher)
            .field("initialized", &self.initialized.get().is_some())
            .finish()
    }
}
