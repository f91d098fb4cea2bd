//! Card types, notes, and the cards generated from them

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::cards::insert_card;
use super::timestamp_to_datetime;
use crate::domain::{Card, CardId, CardType, CardTypeId, DeckId, Note, NoteId};
use crate::error::{Error, Result};

pub fn insert_card_type(conn: &Connection, card_type: &CardType) -> Result<CardTypeId> {
    conn.execute(
        "INSERT INTO card_types (fields, tags, modified_at, templates) VALUES (?1, ?2, ?3, ?4)",
        params![
            serde_json::to_string(&card_type.fields)?,
            serde_json::to_string(&card_type.tags)?,
            card_type.modified_at.timestamp(),
            serde_json::to_string(&card_type.templates)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_card_type(conn: &Connection, id: CardTypeId) -> Result<Option<CardType>> {
    let row = conn
        .query_row(
            "SELECT id, fields, tags, modified_at, templates FROM card_types WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, CardTypeId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    timestamp_to_datetime(3, row.get(3)?)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((id, fields, tags, modified_at, templates)) = row else {
        return Ok(None);
    };

    Ok(Some(CardType {
        id,
        fields: serde_json::from_str(&fields)?,
        tags: parse_tags(tags.as_deref())?,
        templates: serde_json::from_str(&templates)?,
        modified_at,
    }))
}

/// Tags are a JSON array; older rows may hold a plain space separated string
fn parse_tags(raw: Option<&str>) -> Result<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) if s.trim_start().starts_with('[') => Ok(serde_json::from_str(s)?),
        Some(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
    }
}

/// Add a note and one New card per template of its card type.
///
/// Returns the note id and the ids of the generated cards in ordinal order.
pub fn add_note(
    conn: &mut Connection,
    card_type_id: CardTypeId,
    deck_id: DeckId,
    field_values: &[String],
    starting_ease: u32,
) -> Result<(NoteId, Vec<CardId>)> {
    let card_type = get_card_type(conn, card_type_id)?.ok_or_else(|| {
        Error::InvalidState(format!("card type {} does not exist", card_type_id))
    })?;
    if field_values.len() != card_type.fields.len() {
        return Err(Error::InvalidState(format!(
            "card type {} has {} fields, got {} values",
            card_type_id,
            card_type.fields.len(),
            field_values.len()
        )));
    }

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO notes (card_type_id, field_values) VALUES (?1, ?2)",
        params![card_type_id, serde_json::to_string(field_values)?],
    )?;
    let note_id = tx.last_insert_rowid();

    let now = Utc::now();
    let mut card_ids = Vec::with_capacity(card_type.templates.len());
    for (ord, template) in card_type.templates.iter().enumerate() {
        let mut card = Card::new(
            note_id,
            deck_id,
            ord as u32,
            template.front.clone(),
            template.back.clone(),
            starting_ease,
        );
        card.created_at = now;
        card_ids.push(insert_card(&tx, &card)?);
    }
    tx.commit()?;

    tracing::debug!("Added note {} with {} cards", note_id, card_ids.len());
    Ok((note_id, card_ids))
}

pub fn get_note(conn: &Connection, id: NoteId) -> Result<Option<Note>> {
    let row = conn
        .query_row(
            "SELECT id, card_type_id, field_values FROM notes WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, NoteId>(0)?, row.get::<_, CardTypeId>(1)?, row.get::<_, String>(2)?)),
        )
        .optional()?;

    row.map(|(id, card_type_id, values)| {
        Ok(Note {
            id,
            card_type_id,
            field_values: serde_json::from_str(&values)?,
        })
    })
    .transpose()
}

/// Delete a note together with its cards and their review history
pub fn delete_note(conn: &mut Connection, id: NoteId) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM review_logs WHERE card_id IN (SELECT id FROM cards WHERE note_id = ?1)",
        params![id],
    )?;
    let cards = tx.execute("DELETE FROM cards WHERE note_id = ?1", params![id])?;
    tx.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(cards)
}
