//! Durable rule storage.

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

use super::migrations::migrations;
use crate::config::RulesConfig;
use crate::error::{Error, Result};
use crate::rule::{BlockRule, Category, RuleKind, KIND_KEYWORD, KIND_PATTERN, KIND_USER};

/// Persistence backend of a [`RuleStore`](super::RuleStore).
///
/// All methods block on I/O.
pub trait RuleStorage: Send + Sync {
    /// Every persisted rule, in id order. Rows that no longer form a valid
    /// rule are skipped.
    fn load_all(&self) -> Result<Vec<BlockRule>>;

    /// Persist a new rule and return it with its assigned id.
    /// The id of `rule` itself is ignored.
    fn insert(&self, rule: &BlockRule) -> Result<BlockRule>;

    /// Overwrite the row with `rule.id`. Fails with
    /// [`Error::RuleNotFound`] when there is no such row.
    fn update(&self, rule: &BlockRule) -> Result<()>;

    /// First persisted rule with the same kind and value.
    fn find(&self, kind: &RuleKind) -> Result<Option<BlockRule>>;

    /// Delete a rule; returns whether a row existed.
    fn delete(&self, id: i64) -> Result<bool>;

    /// Delete every rule; returns the number of rows removed.
    fn clear(&self) -> Result<usize>;
}

/// [`RuleStorage`] backed by a single SQLite table.
pub struct SqliteRuleStorage {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

type RuleRow = (i64, i64, i64, Value, Option<String>);

const SELECT_COLUMNS: &str = "SELECT id, kind, category, value, label FROM block_rule";

impl SqliteRuleStorage {
    /// Open (or create) the database file, enable WAL and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("Rule database journal mode: {}", mode);
        migrations().to_latest(&mut conn)?;

        log::info!("Rule database opened at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations().to_latest(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        Self::open(&config.database)
    }

    /// Database file, `None` for in-memory storage.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl RuleStorage for SqliteRuleStorage {
    fn load_all(&self) -> Result<Vec<BlockRule>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<RuleRow>>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.0;
            match rule_from_row(row) {
                Ok(rule) => rules.push(rule),
                Err(e) => log::warn!("Skipping unreadable rule row {}: {}", id, e),
            }
        }
        Ok(rules)
    }

    fn insert(&self, rule: &BlockRule) -> Result<BlockRule> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO block_rule (kind, category, value, label) VALUES (?1, ?2, ?3, ?4)",
            params![
                rule.kind.code(),
                rule.category.code(),
                value_of(&rule.kind),
                rule.label
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(rule.clone().with_id(id))
    }

    fn update(&self, rule: &BlockRule) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE block_rule SET kind = ?2, category = ?3, value = ?4, label = ?5 WHERE id = ?1",
            params![
                rule.id,
                rule.kind.code(),
                rule.category.code(),
                value_of(&rule.kind),
                rule.label
            ],
        )?;
        if changed == 0 {
            return Err(Error::RuleNotFound(rule.id));
        }
        Ok(())
    }

    fn find(&self, kind: &RuleKind) -> Result<Option<BlockRule>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "{} WHERE kind = ?1 AND value = ?2 ORDER BY id LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![kind.code(), value_of(kind)],
                read_row,
            )
            .optional()?;
        row.map(rule_from_row).transpose()
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM block_rule WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM block_rule", [])?)
    }
}

impl std::fmt::Debug for SqliteRuleStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRuleStorage")
            .field("path", &self.path)
            .finish()
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn value_of(kind: &RuleKind) -> Value {
    match kind {
        RuleKind::Keyword(keyword) => Value::Text(keyword.clone()),
        RuleKind::UserId(uid) => Value::Integer(*uid),
        RuleKind::Pattern(pattern) => Value::Text(pattern.as_str().to_string()),
    }
}

fn rule_from_row((id, kind, category, value, label): RuleRow) -> Result<BlockRule> {
    let category = Category::from_code(category).ok_or_else(|| {
        Error::InvalidRule(format!("rule {}: unknown category {}", id, category))
    })?;

    let kind = match (kind, value) {
        (KIND_KEYWORD, Value::Text(text)) => RuleKind::keyword(text)?,
        (KIND_PATTERN, Value::Text(text)) => RuleKind::pattern(&text)?,
        (KIND_USER, Value::Integer(uid)) => RuleKind::UserId(uid),
        (kind, value) => {
            return Err(Error::InvalidRule(format!(
                "rule {}: kind {} with value {:?}",
                id, kind, value
            )))
        }
    };

    Ok(BlockRule {
        id,
        kind,
        category,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SqliteRuleStorage {
        SqliteRuleStorage::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let storage = storage();
        let a = storage
            .insert(&BlockRule::keyword("spam", Category::Blacklist).unwrap())
            .unwrap();
        let b = storage
            .insert(&BlockRule::user(42, Category::Whitelist).with_label("bob"))
            .unwrap();

        assert!(a.is_persisted());
        assert!(b.id > a.id);

        let all = storage.load_all().unwrap();
        assert_eq!(all, vec![a, b]);
        assert_eq!(all[1].label.as_deref(), Some("bob"));
    }

    #[test]
    fn test_value_types_do_not_mix() {
        let storage = storage();
        storage
            .insert(&BlockRule::keyword("42", Category::Blacklist).unwrap())
            .unwrap();

        assert!(storage.find(&RuleKind::UserId(42)).unwrap().is_none());
        let found = storage.find(&RuleKind::keyword("42").unwrap()).unwrap();
        assert_eq!(found.map(|r| r.kind.code()), Some(KIND_KEYWORD));
    }

    #[test]
    fn test_pattern_round_trip() {
        let storage = storage();
        let rule = storage
            .insert(&BlockRule::pattern(r"^\d+$", Category::Blacklist).unwrap())
            .unwrap();

        let loaded = storage.load_all().unwrap();
        assert_eq!(loaded, vec![rule]);
        assert!(loaded[0].matches(0, &["12345"]));
    }

    #[test]
    fn test_update() {
        let storage = storage();
        let rule = storage
            .insert(&BlockRule::user(7, Category::Blacklist))
            .unwrap();

        let mut changed = rule.clone();
        changed.category = Category::Whitelist;
        storage.update(&changed).unwrap();
        assert_eq!(storage.load_all().unwrap(), vec![changed]);

        let missing = BlockRule::user(8, Category::Blacklist).with_id(999);
        assert!(matches!(
            storage.update(&missing),
            Err(Error::RuleNotFound(999))
        ));
    }

    #[test]
    fn test_delete_and_clear() {
        let storage = storage();
        let a = storage.insert(&BlockRule::user(1, Category::Blacklist)).unwrap();
        storage.insert(&BlockRule::user(2, Category::Blacklist)).unwrap();
        storage.insert(&BlockRule::user(3, Category::Blacklist)).unwrap();

        assert!(storage.delete(a.id).unwrap());
        assert!(!storage.delete(a.id).unwrap());
        assert_eq!(storage.clear().unwrap(), 2);
        assert!(storage.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let storage = storage();
        let kept = storage.insert(&BlockRule::user(5, Category::Blacklist)).unwrap();
        {
            let conn = storage.conn.lock();
            // Unknown category, blank keyword, broken regex, mistyped user id
            conn.execute_batch(
                "INSERT INTO block_rule (kind, category, value) VALUES (1, 99, 5);
                 INSERT INTO block_rule (kind, category, value) VALUES (0, 10, '');
                 INSERT INTO block_rule (kind, category, value) VALUES (2, 10, '(');
                 INSERT INTO block_rule (kind, category, value) VALUES (1, 10, 'abc');",
            )
            .unwrap();
        }

        assert_eq!(storage.load_all().unwrap(), vec![kept]);
    }

    #[test]
    fn test_rule_from_row_reports_reason() {
        let row = (7, KIND_KEYWORD, 10, Value::Text("  ".to_string()), None);
        assert!(matches!(rule_from_row(row), Err(Error::InvalidRule(_))));

        let row = (8, KIND_USER, 12, Value::Integer(1), None);
        assert!(matches!(rule_from_row(row), Err(Error::InvalidRule(_))));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rules.db");

        {
            let storage = SqliteRuleStorage::open(&path).unwrap();
            storage
                .insert(&BlockRule::keyword("kept", Category::Blacklist).unwrap())
                .unwrap();
        }

        let storage = SqliteRuleStorage::open(&path).unwrap();
        assert_eq!(storage.path(), Some(path.as_path()));
        let all = storage.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind.as_keyword(), Some("kept"));
    }
}
