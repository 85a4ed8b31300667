//! Database schema definitions
//!
//! The schema version lives in `PRAGMA user_version`. Each entry of
//! `MIGRATIONS` upgrades the database by one version and must keep existing
//! records.

use crate::DB_VERSION;

/// SQL to create the chunk collection
pub const CREATE_FILE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS FileChunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk BLOB NOT NULL
)
"#;

/// Statements that take the database from version `n` to `n + 1`, indexed by `n`
pub const MIGRATIONS: &[&[&str]] = &[
    // 0 -> 1
    &[CREATE_FILE_CHUNKS_TABLE],
];

/// Migration steps needed to bring a database at `current` up to `DB_VERSION`
pub fn pending_migrations(current: i64) -> impl Iterator<Item = (i64, &'static [&'static str])> {
    MIGRATIONS
        .iter()
        .enumerate()
        .map(|(from, stmts)| (from as i64, *stmts))
        .filter(move |(from, _)| *from >= current && *from < DB_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_reach_current_version() {
        assert_eq!(MIGRATIONS.len() as i64, DB_VERSION);
        assert_eq!(pending_migrations(0).count() as i64, DB_VERSION);
        assert_eq!(pending_migrations(DB_VERSION).count(), 0);
    }
}
