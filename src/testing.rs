//! Test utilities for database setup.
//!
//! Reuses the authoritative schema initialization so tests never carry their
//! own copy of the DDL.

use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::TempDir;

use crate::domain::{Card, CardId, DeckId};

/// A migrated database file in a temporary directory, removed on drop
pub struct TestEnv {
    /// Kept alive for the lifetime of the database file
    pub temp: TempDir,
    pub conn: Connection,
}

impl TestEnv {
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let conn = Connection::open(temp.path().join("flashdeck.db"))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        crate::db::schema::run_migrations(&conn)?;

        Ok(Self { temp, conn })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Insert a New card backed by a throwaway one-field note
pub fn insert_test_card(conn: &Connection, deck_id: DeckId, card_ord: u32) -> CardId {
    conn.execute(
        "INSERT INTO card_types (fields, tags, modified_at) VALUES ('[\"Front\"]', '[]', 0)",
        [],
    )
    .unwrap();
    let card_type_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO notes (card_type_id, field_values) VALUES (?1, '[\"x\"]')",
        params![card_type_id],
    )
    .unwrap();
    let note_id = conn.last_insert_rowid();

    let card = Card::new(note_id, deck_id, card_ord, "{{Front}}".to_string(), String::new(), 250);
    crate::db::insert_card(conn, &card).unwrap()
}

/// Route tracing output through the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("flashdeck=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_creates_database_file() {
        let env = TestEnv::new().unwrap();
        assert!(env.path().join("flashdeck.db").exists());
    }

    #[test]
    fn test_env_enforces_foreign_keys() {
        let env = TestEnv::new().unwrap();
        let result = env.conn.execute(
            "INSERT INTO cards (note_id, deck_id, created_at) VALUES (999, 999, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
