use rusqlite::{Connection, Result};

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create tables with COMPLETE schema for new databases
    // Migrations below handle upgrades for existing databases
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS decks (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      parent_deck_id INTEGER,
      FOREIGN KEY (parent_deck_id) REFERENCES decks(id)
    );

    CREATE TABLE IF NOT EXISTS card_types (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      fields TEXT NOT NULL,
      tags TEXT,
      modified_at INTEGER NOT NULL,
      templates TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS notes (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      card_type_id INTEGER NOT NULL,
      field_values TEXT NOT NULL,
      FOREIGN KEY (card_type_id) REFERENCES card_types(id)
    );

    CREATE TABLE IF NOT EXISTS cards (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      note_id INTEGER,
      deck_id INTEGER,
      is_active BOOLEAN NOT NULL DEFAULT 1,
      card_ord INTEGER NOT NULL DEFAULT 0,
      created_at INTEGER NOT NULL,
      next_due INTEGER,
      template_front TEXT,
      template_back TEXT,
      -- Scheduling state
      queue_state TEXT NOT NULL DEFAULT 'New',
      interval_days INTEGER NOT NULL DEFAULT 0,
      ease_factor INTEGER NOT NULL DEFAULT 250,
      lapse_count INTEGER NOT NULL DEFAULT 0,
      learning_step INTEGER NOT NULL DEFAULT 0,
      review_count INTEGER NOT NULL DEFAULT 0,
      is_suspended INTEGER NOT NULL DEFAULT 0,
      version INTEGER NOT NULL DEFAULT 0,
      FOREIGN KEY (note_id) REFERENCES notes(id),
      FOREIGN KEY (deck_id) REFERENCES decks(id)
    );

    CREATE TABLE IF NOT EXISTS review_logs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      card_id INTEGER NOT NULL,
      grade INTEGER NOT NULL,
      reviewed_at INTEGER NOT NULL,
      queue_before TEXT NOT NULL,
      queue_after TEXT NOT NULL,
      interval_before INTEGER NOT NULL,
      interval_after INTEGER NOT NULL,
      ease_before INTEGER NOT NULL,
      ease_after INTEGER NOT NULL,
      FOREIGN KEY (card_id) REFERENCES cards(id)
    );

    -- Indexes
    CREATE INDEX IF NOT EXISTS idx_decks_parent ON decks(parent_deck_id);
    CREATE INDEX IF NOT EXISTS idx_notes_card_type ON notes(card_type_id);
    CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);
    CREATE INDEX IF NOT EXISTS idx_cards_next_due ON cards(next_due);
    CREATE INDEX IF NOT EXISTS idx_review_logs_card_id ON review_logs(card_id);
    "#,
    )?;

    // ============================================================
    // MIGRATIONS FOR EXISTING DATABASES
    // Databases created before the scheduler existed have the bare
    // cards/card_types tables. These are no-ops for new databases.
    // ============================================================

    add_column_if_missing(conn, "card_types", "templates", "TEXT NOT NULL DEFAULT '[]'")?;

    add_column_if_missing(conn, "cards", "note_id", "INTEGER")?;
    add_column_if_missing(conn, "cards", "queue_state", "TEXT NOT NULL DEFAULT 'New'")?;
    add_column_if_missing(conn, "cards", "interval_days", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "cards", "ease_factor", "INTEGER NOT NULL DEFAULT 250")?;
    add_column_if_missing(conn, "cards", "lapse_count", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "cards", "learning_step", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "cards", "review_count", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "cards", "is_suspended", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "cards", "version", "INTEGER NOT NULL DEFAULT 0")?;

    // New cards carry no due time; older rows defaulted it to created_at + 1 day
    conn.execute(
        "UPDATE cards SET next_due = NULL WHERE queue_state = 'New' AND review_count = 0 AND next_due IS NOT NULL",
        [],
    )?;

    // Index on a column that may only exist after the migrations above
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_note_id ON cards(note_id)",
        [],
    )?;

    Ok(())
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    conn
        .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
        .is_ok()
}

/// Add a column if it doesn't already exist
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
    if !column_exists(conn, table, column) {
        tracing::info!("Migrating {}: adding column {}", table, column);
        conn.execute(
            &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
            [],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert!(column_exists(&conn, "cards", "version"));
        assert!(column_exists(&conn, "notes", "field_values"));
    }

    #[test]
    fn test_upgrades_bare_schema() {
        let conn = Connection::open_in_memory().unwrap();
        // Layout written by the pre-scheduler application
        conn.execute_batch(
            r#"
            CREATE TABLE decks (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              parent_deck_id INTEGER
            );
            CREATE TABLE card_types (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              fields TEXT NOT NULL,
              tags TEXT,
              modified_at INTEGER NOT NULL
            );
            CREATE TABLE cards (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              card_type_id INTEGER,
              deck_id INTEGER,
              card_ord INTEGER,
              created_at INTEGER NOT NULL,
              next_due INTEGER,
              template_front TEXT,
              template_back TEXT,
              is_active BOOLEAN DEFAULT 1
            );
            INSERT INTO decks (name) VALUES ('Default');
            INSERT INTO cards (card_type_id, deck_id, card_ord, created_at, next_due, template_front, template_back)
            VALUES (1, 1, 0, 1700000000, 1700086400, 'Q', 'A');
            "#,
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        for column in [
            "note_id",
            "queue_state",
            "interval_days",
            "ease_factor",
            "lapse_count",
            "learning_step",
            "review_count",
            "is_suspended",
            "version",
        ] {
            assert!(column_exists(&conn, "cards", column), "missing {}", column);
        }
        assert!(column_exists(&conn, "card_types", "templates"));

        let (queue, ease, next_due): (String, i64, Option<i64>) = conn
            .query_row(
                "SELECT queue_state, ease_factor, next_due FROM cards WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(queue, "New");
        assert_eq!(ease, 250);
        assert_eq!(next_due, None);
    }
}
