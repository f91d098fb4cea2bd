use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deck::DeckId;
use super::note::NoteId;

pub type CardId = i64;

/// Position of a card in the grade-driven state machine.
///
/// Suspension is tracked separately on [`Card::suspended`] so that the
/// underlying queue survives a suspend/unsuspend round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
  New,
  Learning,
  Review,
  Relearning,
}

impl QueueState {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "New" => Some(Self::New),
      "Learning" => Some(Self::Learning),
      "Review" => Some(Self::Review),
      "Relearning" => Some(Self::Relearning),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "New",
      Self::Learning => "Learning",
      Self::Review => "Review",
      Self::Relearning => "Relearning",
    }
  }

  /// Learning and Relearning cards work through short minute-based steps
  pub fn is_learning(&self) -> bool {
    matches!(self, Self::Learning | Self::Relearning)
  }
}

/// Scheduling fields of a card. Only the scheduler produces new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingState {
  pub queue: QueueState,
  /// Whole days. While relearning this holds the pre-lapse interval.
  pub interval_days: u32,
  /// Fixed-point percentage: 250 = 2.50x
  pub ease_factor: u32,
  pub lapses: u32,
  pub learning_step: u32,
  /// Number of graded reviews
  pub reps: u32,
  pub next_due: Option<DateTime<Utc>>,
}

impl SchedulingState {
  pub fn new_card(starting_ease: u32) -> Self {
    Self {
      queue: QueueState::New,
      interval_days: 0,
      ease_factor: starting_ease,
      lapses: 0,
      learning_step: 0,
      reps: 0,
      next_due: None,
    }
  }

  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    self.next_due.is_some_and(|due| due <= now)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
  pub id: CardId,
  pub note_id: NoteId,
  pub deck_id: DeckId,
  pub is_active: bool,
  /// Template ordinal; distinguishes sibling cards of one note
  pub card_ord: u32,
  pub created_at: DateTime<Utc>,
  pub template_front: String,
  pub template_back: String,
  pub suspended: bool,
  pub schedule: SchedulingState,
  /// Optimistic concurrency token, bumped on every schedule write
  pub version: i64,
}

impl Card {
  pub fn new(
    note_id: NoteId,
    deck_id: DeckId,
    card_ord: u32,
    template_front: String,
    template_back: String,
    starting_ease: u32,
  ) -> Self {
    Self {
      id: 0,
      note_id,
      deck_id,
      is_active: true,
      card_ord,
      created_at: Utc::now(),
      template_front,
      template_back,
      suspended: false,
      schedule: SchedulingState::new_card(starting_ease),
      version: 0,
    }
  }

  /// Active and not suspended
  pub fn is_studyable(&self) -> bool {
    self.is_active && !self.suspended
  }

  pub fn queue(&self) -> QueueState {
    self.schedule.queue
  }

  pub fn next_due(&self) -> Option<DateTime<Utc>> {
    self.schedule.next_due
  }
}
