use rusqlite_migration::{Migrations, M};

/// Schema migrations, tracked through SQLite's `user_version` pragma.
///
/// `value` has no declared type so keyword text and user ids keep their
/// storage class and compare exactly.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE block_rule (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind INTEGER NOT NULL,
    category INTEGER NOT NULL,
    value NOT NULL,
    label TEXT
);

CREATE INDEX idx_block_rule_target ON block_rule(kind, value);",
    )])
}
