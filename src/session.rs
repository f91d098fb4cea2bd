//! Review session orchestration.
//!
//! A session pulls the next due card from a [`CardStore`], accepts a grade for
//! it, asks the scheduler for the next state and persists that state together
//! with a review log. Selection is redone before every card because grading
//! changes what is due. If persisting fails the computed state is dropped and
//! the same card is presented again.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::config::SchedulerConfig;
use crate::domain::{Card, CardId, DeckId, DeckTree, Grade, QueueState, ReviewLog, SchedulingState};
use crate::error::{Error, Result};
use crate::srs::{schedule_card, select_due, DueCounts, SessionLimits};

/// Persistence collaborator used by [`ReviewSession`]
pub trait CardStore {
  fn deck_tree(&self) -> Result<DeckTree>;

  /// Every card in the given decks, including ones that are not due
  fn cards_in_scope(&self, scope: &BTreeSet<DeckId>) -> Result<Vec<Card>>;

  fn card(&self, card_id: CardId) -> Result<Option<Card>>;

  /// Atomically write `next` (only if the stored version still equals
  /// `card.version`) and append `log`. Returns the new version.
  fn record_review(&self, card: &Card, next: &SchedulingState, log: &ReviewLog) -> Result<i64>;
}

/// Result of a successfully recorded answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredCard {
  pub card_id: CardId,
  pub grade: Grade,
  pub before: SchedulingState,
  pub after: SchedulingState,
  pub version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
  pub deck_id: DeckId,
  /// Recorded answers indexed by grade button (Again..Easy)
  pub answers: [u32; 4],
  /// New cards seen for the first time
  pub introduced: u32,
  /// Review cards answered
  pub reviewed: u32,
  pub not_recorded: u32,
  /// Cards set aside because their stored state could not be scheduled
  pub skipped: u32,
}

impl SessionSummary {
  pub fn answers_for(&self, grade: Grade) -> u32 {
    self.answers[grade_index(grade)]
  }

  pub fn total_answers(&self) -> u32 {
    self.answers.iter().sum()
  }
}

fn grade_index(grade: Grade) -> usize {
  (grade.as_u8() - 1) as usize
}

pub struct ReviewSession<S: CardStore> {
  store: S,
  scope: BTreeSet<DeckId>,
  config: SchedulerConfig,
  limits: SessionLimits,
  current: Option<Card>,
  /// Last answer for `current` failed to persist
  retry: bool,
  /// Cards whose stored state was rejected by the scheduler
  skipped: BTreeSet<CardId>,
  summary: SessionSummary,
}

impl<S: CardStore> ReviewSession<S> {
  /// Start a session over `deck_id` and all of its descendants
  pub fn new(store: S, deck_id: DeckId, config: SchedulerConfig) -> Result<Self> {
    config.validate()?;
    let scope = store.deck_tree()?.resolve_scope(deck_id)?;
    tracing::info!("Starting review session for deck {} ({} decks in scope)", deck_id, scope.len());

    Ok(Self {
      store,
      scope,
      limits: SessionLimits::from_config(&config),
      config,
      current: None,
      retry: false,
      skipped: BTreeSet::new(),
      summary: SessionSummary {
        deck_id,
        ..SessionSummary::default()
      },
    })
  }

  pub fn scope(&self) -> &BTreeSet<DeckId> {
    &self.scope
  }

  /// Card currently presented, if any
  pub fn current(&self) -> Option<&Card> {
    self.current.as_ref()
  }

  pub fn summary(&self) -> &SessionSummary {
    &self.summary
  }

  fn remaining_limits(&self) -> SessionLimits {
    self.limits.remaining(self.summary.introduced, self.summary.reviewed)
  }

  fn candidates(&self) -> Result<Vec<Card>> {
    let mut cards = self.store.cards_in_scope(&self.scope)?;
    cards.retain(|c| !self.skipped.contains(&c.id));
    Ok(cards)
  }

  /// Due counts for what is left of this session at `now`
  pub fn remaining(&self, now: DateTime<Utc>) -> Result<DueCounts> {
    let cards = self.candidates()?;
    let queue = select_due(&cards, &self.scope, now, &self.remaining_limits(), self.config.interleave_policy);
    Ok(queue.counts())
  }

  /// The next card to present, or `None` when nothing is due.
  ///
  /// After an unrecorded answer the same card comes back, re-read so that a
  /// concurrent change is picked up.
  pub fn next_card(&mut self, now: DateTime<Utc>) -> Result<Option<Card>> {
    if self.retry {
      if let Some(current) = &self.current {
        let card_id = current.id;
        if let Some(fresh) = self.store.card(card_id)?.filter(|c| c.is_studyable()) {
          self.retry = false;
          self.current = Some(fresh.clone());
          return Ok(Some(fresh));
        }
        tracing::debug!("Card {} vanished before retry, selecting another", card_id);
      }
      self.retry = false;
    }

    let cards = self.candidates()?;
    let queue = select_due(&cards, &self.scope, now, &self.remaining_limits(), self.config.interleave_policy);
    self.current = queue.first().cloned();
    Ok(self.current.clone())
  }

  /// Grade the presented card and persist the outcome
  pub fn answer(&mut self, card_id: CardId, grade: Grade, now: DateTime<Utc>) -> Result<AnsweredCard> {
    let card = match &self.current {
      Some(card) if card.id == card_id => card,
      Some(card) => {
        return Err(Error::InvalidState(format!(
          "answered card {} but card {} is presented",
          card_id, card.id
        )));
      }
      None => return Err(Error::InvalidState(format!("card {} was not presented", card_id))),
    };

    let next = match schedule_card(card, grade, now, &self.config) {
      Ok(next) => next,
      Err(e) => {
        tracing::warn!("Skipping card {} for the rest of the session: {}", card_id, e);
        self.skipped.insert(card_id);
        self.summary.skipped += 1;
        self.current = None;
        self.retry = false;
        return Err(e);
      }
    };
    let log = ReviewLog::new(card.id, grade, now, &card.schedule, &next);

    let version = match self.store.record_review(card, &next, &log) {
      Ok(version) => version,
      Err(e) => {
        tracing::warn!("Review of card {} not recorded: {}", card_id, e);
        self.summary.not_recorded += 1;
        self.retry = true;
        return Err(Error::ReviewNotRecorded {
          card_id,
          source: Box::new(e),
        });
      }
    };

    let before = card.schedule.clone();
    match before.queue {
      QueueState::New => self.summary.introduced += 1,
      QueueState::Review => self.summary.reviewed += 1,
      QueueState::Learning | QueueState::Relearning => {}
    }
    self.summary.answers[grade_index(grade)] += 1;
    self.current = None;
    self.retry = false;

    Ok(AnsweredCard {
      card_id,
      grade,
      before,
      after: next,
      version,
    })
  }

  /// End the session. Anything presented but not answered is left untouched.
  pub fn stop(self) -> SessionSummary {
    tracing::info!(
      "Review session for deck {} finished: {} answers, {} new, {} reviews, {} not recorded, {} skipped",
      self.summary.deck_id,
      self.summary.total_answers(),
      self.summary.introduced,
      self.summary.reviewed,
      self.summary.not_recorded,
      self.summary.skipped
    );
    self.summary
  }
}
