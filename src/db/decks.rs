//! Deck rows and the in-memory deck tree

use rusqlite::{params, Connection, Result};

use crate::domain::{Deck, DeckId, DeckTree};

pub fn insert_deck(conn: &Connection, name: &str, parent_deck_id: Option<DeckId>) -> Result<DeckId> {
    conn.execute(
        "INSERT INTO decks (name, parent_deck_id) VALUES (?1, ?2)",
        params![name, parent_deck_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_all_decks(conn: &Connection) -> Result<Vec<Deck>> {
    let mut stmt = conn.prepare("SELECT id, name, parent_deck_id FROM decks ORDER BY id")?;
    let decks = stmt
        .query_map([], |row| {
            Ok(Deck {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_deck_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(decks)
}

pub fn load_deck_tree(conn: &Connection) -> Result<DeckTree> {
    Ok(DeckTree::new(get_all_decks(conn)?))
}
