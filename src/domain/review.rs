use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::{CardId, QueueState, SchedulingState};
use crate::error::Error;

/// Answer button pressed after revealing a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
  Again,
  Hard,
  Good,
  Easy,
}

impl Grade {
  pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

  /// Button number: 1=Again, 2=Hard, 3=Good, 4=Easy
  pub fn as_u8(&self) -> u8 {
    match self {
      Self::Again => 1,
      Self::Hard => 2,
      Self::Good => 3,
      Self::Easy => 4,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Again => "again",
      Self::Hard => "hard",
      Self::Good => "good",
      Self::Easy => "easy",
    }
  }
}

impl TryFrom<u8> for Grade {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Self::Again),
      2 => Ok(Self::Hard),
      3 => Ok(Self::Good),
      4 => Ok(Self::Easy),
      other => Err(Error::InvalidGrade(other)),
    }
  }
}

/// One graded review with the scheduling fields before and after
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
  pub id: i64,
  pub card_id: CardId,
  pub grade: Grade,
  pub reviewed_at: DateTime<Utc>,
  pub queue_before: QueueState,
  pub queue_after: QueueState,
  pub interval_before: u32,
  pub interval_after: u32,
  pub ease_before: u32,
  pub ease_after: u32,
}

impl ReviewLog {
  pub fn new(
    card_id: CardId,
    grade: Grade,
    reviewed_at: DateTime<Utc>,
    before: &SchedulingState,
    after: &SchedulingState,
  ) -> Self {
    Self {
      id: 0,
      card_id,
      grade,
      reviewed_at,
      queue_before: before.queue,
      queue_after: after.queue,
      interval_before: before.interval_days,
      interval_after: after.interval_days,
      ease_before: before.ease_factor,
      ease_after: after.ease_factor,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_grade_try_from_valid() {
    assert_eq!(Grade::try_from(1u8).unwrap(), Grade::Again);
    assert_eq!(Grade::try_from(2u8).unwrap(), Grade::Hard);
    assert_eq!(Grade::try_from(3u8).unwrap(), Grade::Good);
    assert_eq!(Grade::try_from(4u8).unwrap(), Grade::Easy);
  }

  #[test]
  fn test_grade_try_from_out_of_range() {
    assert!(matches!(Grade::try_from(0u8), Err(Error::InvalidGrade(0))));
    assert!(matches!(Grade::try_from(5u8), Err(Error::InvalidGrade(5))));
    assert!(matches!(Grade::try_from(255u8), Err(Error::InvalidGrade(255))));
  }

  #[test]
  fn test_grade_u8_roundtrip() {
    for grade in Grade::ALL {
      assert_eq!(Grade::try_from(grade.as_u8()).unwrap(), grade);
    }
  }

  #[test]
  fn test_review_log_captures_transition() {
    let before = SchedulingState {
      queue: QueueState::Review,
      interval_days: 10,
      ease_factor: 250,
      lapses: 0,
      learning_step: 0,
      reps: 4,
      next_due: None,
    };
    let after = SchedulingState {
      queue: QueueState::Relearning,
      ease_factor: 230,
      lapses: 1,
      ..before.clone()
    };

    let log = ReviewLog::new(9, Grade::Again, Utc::now(), &before, &after);
    assert_eq!(log.card_id, 9);
    assert_eq!(log.queue_before, QueueState::Review);
    assert_eq!(log.queue_after, QueueState::Relearning);
    assert_eq!(log.ease_before, 250);
    assert_eq!(log.ease_after, 230);
    assert_eq!(log.interval_before, 10);
    assert_eq!(log.interval_after, 10);
  }
}
