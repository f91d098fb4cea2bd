//! Review history

use rusqlite::{params, Connection, Result, Row};

use super::{conversion_error, timestamp_to_datetime};
use crate::domain::{CardId, Grade, QueueState, ReviewLog};
use crate::error::Error;

pub fn insert_review_log(conn: &Connection, log: &ReviewLog) -> Result<i64> {
    conn.execute(
        r#"
    INSERT INTO review_logs (card_id, grade, reviewed_at, queue_before, queue_after,
                             interval_before, interval_after, ease_before, ease_after)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    "#,
        params![
            log.card_id,
            log.grade.as_u8(),
            log.reviewed_at.timestamp(),
            log.queue_before.as_str(),
            log.queue_after.as_str(),
            log.interval_before,
            log.interval_after,
            log.ease_before,
            log.ease_after,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest first
pub fn get_review_logs_for_card(conn: &Connection, card_id: CardId) -> Result<Vec<ReviewLog>> {
    let mut stmt = conn.prepare(
        r#"
    SELECT id, card_id, grade, reviewed_at, queue_before, queue_after,
           interval_before, interval_after, ease_before, ease_after
    FROM review_logs
    WHERE card_id = ?1
    ORDER BY reviewed_at, id
    "#,
    )?;
    let logs = stmt
        .query_map(params![card_id], |row| row_to_log(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(logs)
}

pub fn count_reviews(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM review_logs", [], |row| row.get(0))
}

fn parse_queue(idx: usize, s: &str) -> Result<QueueState> {
    QueueState::from_str(s).ok_or_else(|| {
        conversion_error(idx, Error::InvalidState(format!("unknown queue state '{}'", s)))
    })
}

fn row_to_log(row: &Row) -> Result<ReviewLog> {
    let grade = Grade::try_from(row.get::<_, u8>(2)?).map_err(|e| conversion_error(2, e))?;
    Ok(ReviewLog {
        id: row.get(0)?,
        card_id: row.get(1)?,
        grade,
        reviewed_at: timestamp_to_datetime(3, row.get(3)?)?,
        queue_before: parse_queue(4, &row.get::<_, String>(4)?)?,
        queue_after: parse_queue(5, &row.get::<_, String>(5)?)?,
        interval_before: row.get(6)?,
        interval_after: row.get(7)?,
        ease_before: row.get(8)?,
        ease_after: row.get(9)?,
    })
}
