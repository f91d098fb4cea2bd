//! Card CRUD, scope queries and scheduling writes

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

use super::{conversion_error, timestamp_to_datetime};
use crate::domain::{Card, CardId, DeckId, NoteId, QueueState, SchedulingState};
use crate::error::{Error, Result};

const CARD_COLUMNS: &str = r#"
    id, note_id, deck_id, is_active, card_ord, created_at, next_due, template_front, template_back,
    queue_state, interval_days, ease_factor, lapse_count, learning_step, review_count, is_suspended, version
"#;

pub fn insert_card(conn: &Connection, card: &Card) -> rusqlite::Result<CardId> {
    let s = &card.schedule;
    conn.execute(
        r#"
    INSERT INTO cards (note_id, deck_id, is_active, card_ord, created_at, next_due, template_front,
                       template_back, queue_state, interval_days, ease_factor, lapse_count,
                       learning_step, review_count, is_suspended, version)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
    "#,
        params![
            card.note_id,
            card.deck_id,
            card.is_active,
            card.card_ord,
            card.created_at.timestamp(),
            s.next_due.map(|d| d.timestamp()),
            card.template_front,
            card.template_back,
            s.queue.as_str(),
            s.interval_days,
            s.ease_factor,
            s.lapses,
            s.learning_step,
            s.reps,
            card.suspended,
            card.version,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_card_by_id(conn: &Connection, id: CardId) -> rusqlite::Result<Option<Card>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS))?;

    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_card(row)?))
    } else {
        Ok(None)
    }
}

/// Every card in the given decks, regardless of state
pub fn get_cards_in_decks(conn: &Connection, decks: &BTreeSet<DeckId>) -> rusqlite::Result<Vec<Card>> {
    if decks.is_empty() {
        return Ok(vec![]);
    }

    let deck_list = decks
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let query = format!(
        "SELECT {} FROM cards WHERE deck_id IN ({}) ORDER BY id",
        CARD_COLUMNS, deck_list
    );
    let mut stmt = conn.prepare(&query)?;

    let cards = stmt
        .query_map([], |row| row_to_card(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

pub fn count_cards(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
}

/// Write a new scheduling state if the card still has `expected_version`.
///
/// Returns the new version. Fails with [`Error::StaleCard`] when another
/// writer got there first, leaving the stored row untouched.
pub fn update_schedule(
    conn: &Connection,
    card_id: CardId,
    expected_version: i64,
    state: &SchedulingState,
) -> Result<i64> {
    let updated = conn.execute(
        r#"
    UPDATE cards
    SET queue_state = ?1, interval_days = ?2, ease_factor = ?3, lapse_count = ?4,
        learning_step = ?5, review_count = ?6, next_due = ?7, version = version + 1
    WHERE id = ?8 AND version = ?9
    "#,
        params![
            state.queue.as_str(),
            state.interval_days,
            state.ease_factor,
            state.lapses,
            state.learning_step,
            state.reps,
            state.next_due.map(|d| d.timestamp()),
            card_id,
            expected_version,
        ],
    )?;

    if updated == 0 {
        return Err(missing_or_stale(conn, card_id)?);
    }
    Ok(expected_version + 1)
}

/// Suspend or unsuspend a card. Interval, ease and due time are kept.
pub fn set_suspended(conn: &Connection, card_id: CardId, suspended: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE cards SET is_suspended = ?1, version = version + 1 WHERE id = ?2",
        params![suspended, card_id],
    )?;
    if updated == 0 {
        return Err(Error::CardNotFound(card_id));
    }
    tracing::debug!("Card {} suspended={}", card_id, suspended);
    Ok(())
}

pub fn set_active(conn: &Connection, card_id: CardId, active: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE cards SET is_active = ?1, version = version + 1 WHERE id = ?2",
        params![active, card_id],
    )?;
    if updated == 0 {
        return Err(Error::CardNotFound(card_id));
    }
    Ok(())
}

/// Delete a card and its review history
pub fn delete_card(conn: &mut Connection, card_id: CardId) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM review_logs WHERE card_id = ?1", params![card_id])?;
    let deleted = tx.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
    if deleted == 0 {
        return Err(Error::CardNotFound(card_id));
    }
    tx.commit()?;
    Ok(())
}

fn missing_or_stale(conn: &Connection, card_id: CardId) -> Result<Error> {
    let exists = conn
        .query_row("SELECT 1 FROM cards WHERE id = ?1", params![card_id], |_| Ok(()))
        .optional()?
        .is_some();
    if exists {
        tracing::warn!("Card {} changed since it was read, write rejected", card_id);
        Ok(Error::StaleCard { card_id })
    } else {
        Ok(Error::CardNotFound(card_id))
    }
}

fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
    let queue_str: String = row.get(9)?;
    let queue = QueueState::from_str(&queue_str).ok_or_else(|| {
        conversion_error(9, Error::InvalidState(format!("unknown queue state '{}'", queue_str)))
    })?;
    let next_due = match row.get::<_, Option<i64>>(6)? {
        Some(secs) => Some(timestamp_to_datetime(6, secs)?),
        None => None,
    };

    Ok(Card {
        id: row.get(0)?,
        note_id: row.get::<_, Option<NoteId>>(1)?.unwrap_or_default(),
        deck_id: row.get(2)?,
        is_active: row.get::<_, Option<bool>>(3)?.unwrap_or(true),
        card_ord: row.get::<_, Option<u32>>(4)?.unwrap_or_default(),
        created_at: timestamp_to_datetime(5, row.get(5)?)?,
        template_front: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        template_back: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        suspended: row.get(15)?,
        schedule: SchedulingState {
            queue,
            interval_days: row.get(10)?,
            ease_factor: row.get(11)?,
            lapses: row.get(12)?,
            learning_step: row.get(13)?,
            reps: row.get(14)?,
            next_due,
        },
        version: row.get(16)?,
    })
}
