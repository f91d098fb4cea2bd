//! Error taxonomy shared by the scheduler, selector, deck tree and storage.

use thiserror::Error;

use crate::domain::{CardId, DeckId};

#[derive(Debug, Error)]
pub enum Error {
  /// Raw grade value outside the 4-point scale
  #[error("invalid grade {0}, expected 1 (again) to 4 (easy)")]
  InvalidGrade(u8),

  /// Card state violates a scheduling precondition
  #[error("invalid card state: {0}")]
  InvalidState(String),

  #[error("deck hierarchy contains a cycle through deck {deck_id}")]
  CycleDetected { deck_id: DeckId },

  #[error("unknown deck {0}")]
  UnknownDeck(DeckId),

  #[error("no cards are due in the requested scope")]
  EmptyScope,

  #[error("invalid scheduler configuration: {0}")]
  InvalidConfig(String),

  /// Compare-and-swap on the card version failed
  #[error("card {card_id} was modified concurrently")]
  StaleCard { card_id: CardId },

  #[error("card {0} not found")]
  CardNotFound(CardId),

  #[error("storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("malformed JSON column: {0}")]
  Json(#[from] serde_json::Error),

  #[error("database unavailable")]
  LockPoisoned,

  /// Persisting a graded review failed; the computed state was discarded
  #[error("review of card {card_id} was not recorded")]
  ReviewNotRecorded {
    card_id: CardId,
    #[source]
    source: Box<Error>,
  },
}

pub type Result<T> = std::result::Result<T, Error>;
