//! SQLite-backed [`CardStore`]

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;

use super::{
    get_card_by_id, get_cards_in_decks, init_db, init_in_memory, insert_review_log, load_deck_tree,
    set_suspended, try_lock, update_schedule, DbPool,
};
use crate::config::SchedulerConfig;
use crate::domain::{Card, CardId, DeckId, DeckTree, ReviewLog, SchedulingState};
use crate::error::Result;
use crate::session::CardStore;
use crate::srs::{deck_overview, DeckSummary};

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(init_db(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(init_in_memory()?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn suspend(&self, card_id: CardId) -> Result<()> {
        let conn = try_lock(&self.pool)?;
        set_suspended(&conn, card_id, true)
    }

    pub fn unsuspend(&self, card_id: CardId) -> Result<()> {
        let conn = try_lock(&self.pool)?;
        set_suspended(&conn, card_id, false)
    }

    /// New/Learn/Due counts for the deck list
    pub fn deck_overview(&self, now: DateTime<Utc>, config: &SchedulerConfig) -> Result<Vec<DeckSummary>> {
        let conn = try_lock(&self.pool)?;
        let tree = load_deck_tree(&conn)?;
        let all: BTreeSet<DeckId> = tree.walk().into_iter().map(|(deck, _)| deck.id).collect();
        let cards = get_cards_in_decks(&conn, &all)?;
        deck_overview(&tree, &cards, now, config)
    }
}

impl CardStore for SqliteStore {
    fn deck_tree(&self) -> Result<DeckTree> {
        let conn = try_lock(&self.pool)?;
        Ok(load_deck_tree(&conn)?)
    }

    fn cards_in_scope(&self, scope: &BTreeSet<DeckId>) -> Result<Vec<Card>> {
        let conn = try_lock(&self.pool)?;
        Ok(get_cards_in_decks(&conn, scope)?)
    }

    fn card(&self, card_id: CardId) -> Result<Option<Card>> {
        let conn = try_lock(&self.pool)?;
        Ok(get_card_by_id(&conn, card_id)?)
    }

    fn record_review(&self, card: &Card, next: &SchedulingState, log: &ReviewLog) -> Result<i64> {
        let mut conn = try_lock(&self.pool)?;
        let tx = conn.transaction()?;
        let version = update_schedule(&tx, card.id, card.version, next)?;
        insert_review_log(&tx, log)?;
        tx.commit()?;

        tracing::debug!("Recorded {} for card {} (version {})", log.grade.as_str(), card.id, version);
        Ok(version)
    }
}
