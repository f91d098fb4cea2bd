//! Due-card selection.
//!
//! Builds the ordered list of cards to study from a snapshot of the cards in a
//! deck scope:
//! - New cards by creation time, then template ordinal, capped at the new limit
//! - Learning/Relearning cards due now, earliest first
//! - Review cards due now, earliest first, capped at the review limit
//!
//! The three buckets are then mixed according to the [`InterleavePolicy`].
//! A [`DueQueue`] owns its cards and can be iterated any number of times;
//! callers re-select after every grade because grading changes what is due.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::config::{InterleavePolicy, SchedulerConfig};
use crate::domain::{Card, DeckId, DeckTree, QueueState};
use crate::error::{Error, Result};

/// Per-session caps on New and Review cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
  pub new_cards: u32,
  pub review_cards: u32,
}

impl SessionLimits {
  pub fn from_config(config: &SchedulerConfig) -> Self {
    Self {
      new_cards: config.new_cards_per_session,
      review_cards: config.review_cards_per_session,
    }
  }

  /// Limits left after a session has already introduced/reviewed some cards
  pub fn remaining(&self, introduced: u32, reviewed: u32) -> Self {
    Self {
      new_cards: self.new_cards.saturating_sub(introduced),
      review_cards: self.review_cards.saturating_sub(reviewed),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DueCounts {
  pub new: usize,
  pub learning: usize,
  pub review: usize,
}

impl DueCounts {
  pub fn total(&self) -> usize {
    self.new + self.learning + self.review
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
  New,
  Learning,
  Review,
}

#[derive(Debug, Clone)]
pub struct DueQueue {
  new: Vec<Card>,
  learning: Vec<Card>,
  review: Vec<Card>,
  policy: InterleavePolicy,
}

impl DueQueue {
  pub fn counts(&self) -> DueCounts {
    DueCounts {
      new: self.new.len(),
      learning: self.learning.len(),
      review: self.review.len(),
    }
  }

  pub fn len(&self) -> usize {
    self.counts().total()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> DueIter<'_> {
    DueIter {
      queue: self,
      taken: [0; 3],
      cycle_pos: 0,
    }
  }

  /// The card to present next
  pub fn first(&self) -> Option<&Card> {
    self.iter().next()
  }

  /// For callers that treat an empty selection as an error
  pub fn require_non_empty(self) -> Result<Self> {
    if self.is_empty() {
      return Err(Error::EmptyScope);
    }
    Ok(self)
  }

  fn bucket(&self, bucket: Bucket) -> &[Card] {
    match bucket {
      Bucket::New => &self.new,
      Bucket::Learning => &self.learning,
      Bucket::Review => &self.review,
    }
  }
}

impl<'a> IntoIterator for &'a DueQueue {
  type Item = &'a Card;
  type IntoIter = DueIter<'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Lazily interleaves the buckets of a [`DueQueue`]
#[derive(Debug, Clone)]
pub struct DueIter<'a> {
  queue: &'a DueQueue,
  /// Cards taken so far from New, Learning, Review
  taken: [usize; 3],
  cycle_pos: usize,
}

impl<'a> DueIter<'a> {
  fn slot(bucket: Bucket) -> usize {
    match bucket {
      Bucket::New => 0,
      Bucket::Learning => 1,
      Bucket::Review => 2,
    }
  }

  fn has(&self, bucket: Bucket) -> bool {
    self.taken[Self::slot(bucket)] < self.queue.bucket(bucket).len()
  }

  fn take(&mut self, bucket: Bucket) -> &'a Card {
    let slot = Self::slot(bucket);
    let queue: &'a DueQueue = self.queue;
    let card = &queue.bucket(bucket)[self.taken[slot]];
    self.taken[slot] += 1;
    card
  }

  fn cycle_len(&self) -> usize {
    match self.queue.policy {
      InterleavePolicy::LearningFirst => 2,
      InterleavePolicy::Ratio { new, review } => 1 + new as usize + review as usize,
    }
  }

  fn bucket_at(&self, pos: usize) -> Bucket {
    match self.queue.policy {
      InterleavePolicy::LearningFirst if pos == 0 => Bucket::New,
      InterleavePolicy::LearningFirst => Bucket::Review,
      InterleavePolicy::Ratio { .. } if pos == 0 => Bucket::Learning,
      InterleavePolicy::Ratio { new, .. } if pos <= new as usize => Bucket::New,
      InterleavePolicy::Ratio { .. } => Bucket::Review,
    }
  }
}

impl<'a> Iterator for DueIter<'a> {
  type Item = &'a Card;

  fn next(&mut self) -> Option<Self::Item> {
    if self.queue.policy == InterleavePolicy::LearningFirst && self.has(Bucket::Learning) {
      return Some(self.take(Bucket::Learning));
    }

    let len = self.cycle_len();
    for _ in 0..len {
      let bucket = self.bucket_at(self.cycle_pos);
      self.cycle_pos = (self.cycle_pos + 1) % len;
      if self.has(bucket) {
        return Some(self.take(bucket));
      }
    }

    // Buckets the cycle never visits (e.g. a ratio of zero new cards)
    [Bucket::Learning, Bucket::Review, Bucket::New]
      .into_iter()
      .find(|b| self.has(*b))
      .map(|b| self.take(b))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let left = self.queue.len() - self.taken.iter().sum::<usize>();
    (left, Some(left))
  }
}

impl ExactSizeIterator for DueIter<'_> {}

/// Select the cards due in `scope` at `now`
pub fn select_due(
  cards: &[Card],
  scope: &BTreeSet<DeckId>,
  now: DateTime<Utc>,
  limits: &SessionLimits,
  policy: InterleavePolicy,
) -> DueQueue {
  let mut new = Vec::new();
  let mut learning = Vec::new();
  let mut review = Vec::new();

  for card in cards {
    if !card.is_studyable() || !scope.contains(&card.deck_id) {
      continue;
    }
    match card.queue() {
      QueueState::New => new.push(card.clone()),
      QueueState::Learning | QueueState::Relearning if card.schedule.is_due(now) => {
        learning.push(card.clone())
      }
      QueueState::Review if card.schedule.is_due(now) => review.push(card.clone()),
      _ => {}
    }
  }

  new.sort_by(|a, b| {
    a.created_at
      .cmp(&b.created_at)
      .then(a.card_ord.cmp(&b.card_ord))
      .then(a.id.cmp(&b.id))
  });
  new.truncate(limits.new_cards as usize);

  let by_due = |a: &Card, b: &Card| a.next_due().cmp(&b.next_due()).then(a.id.cmp(&b.id));
  learning.sort_by(by_due);
  review.sort_by(by_due);
  review.truncate(limits.review_cards as usize);

  tracing::debug!(
    "Selected {} new, {} learning, {} review cards from {} decks",
    new.len(),
    learning.len(),
    review.len(),
    scope.len()
  );

  DueQueue {
    new,
    learning,
    review,
    policy,
  }
}

/// One row of the deck list: a deck with the due counts of its whole subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSummary {
  pub deck_id: DeckId,
  pub name: String,
  pub depth: usize,
  pub counts: DueCounts,
}

/// New/Learn/Due counts for every deck, listed depth-first
pub fn deck_overview(
  tree: &DeckTree,
  cards: &[Card],
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<Vec<DeckSummary>> {
  let limits = SessionLimits::from_config(config);
  tree
    .walk()
    .into_iter()
    .map(|(deck, depth)| {
      let scope = tree.resolve_scope(deck.id)?;
      let counts = select_due(cards, &scope, now, &limits, config.interleave_policy).counts();
      Ok(DeckSummary {
        deck_id: deck.id,
        name: deck.name.clone(),
        depth,
        counts,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Deck, SchedulingState};
  use chrono::Duration;

  fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
  }

  fn new_card(id: i64, deck_id: DeckId, created_offset_secs: i64, ord: u32) -> Card {
    let mut card = Card::new(id, deck_id, ord, format!("front {}", id), format!("back {}", id), 250);
    card.id = id;
    card.created_at = base_time() + Duration::seconds(created_offset_secs);
    card
  }

  fn scheduled_card(id: i64, deck_id: DeckId, queue: QueueState, due_offset_mins: i64) -> Card {
    let mut card = new_card(id, deck_id, 0, 0);
    card.schedule = SchedulingState {
      queue,
      interval_days: if queue == QueueState::Learning { 0 } else { 5 },
      next_due: Some(base_time() + Duration::minutes(due_offset_mins)),
      ..SchedulingState::new_card(250)
    };
    card
  }

  fn ids<'a>(iter: impl Iterator<Item = &'a Card>) -> Vec<i64> {
    iter.map(|c| c.id).collect()
  }

  fn limits(new_cards: u32, review_cards: u32) -> SessionLimits {
    SessionLimits {
      new_cards,
      review_cards,
    }
  }

  #[test]
  fn test_new_cards_ordered_by_creation_then_ord() {
    let cards = vec![
      new_card(1, 1, 20, 0),
      new_card(2, 1, 10, 1),
      new_card(3, 1, 10, 0),
    ];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![3, 2, 1]);
  }

  #[test]
  fn test_new_limit_caps_new_cards() {
    let cards: Vec<Card> = (1..=5).map(|i| new_card(i, 1, i, 0)).collect();
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(2, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![1, 2]);
  }

  #[test]
  fn test_zero_new_limit_excludes_new_cards() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      new_card(2, 1, 1, 0),
      scheduled_card(3, 1, QueueState::Review, -60),
    ];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(0, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![3]);
    assert!(queue.iter().all(|c| c.queue() != QueueState::New));
  }

  #[test]
  fn test_review_limit_caps_reviews() {
    let cards: Vec<Card> = (1..=4).map(|i| scheduled_card(i, 1, QueueState::Review, -i)).collect();
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(0, 2), InterleavePolicy::LearningFirst);
    // Most overdue first
    assert_eq!(ids(queue.iter()), vec![4, 3]);
  }

  #[test]
  fn test_cards_not_yet_due_are_skipped() {
    let cards = vec![
      scheduled_card(1, 1, QueueState::Review, 60),
      scheduled_card(2, 1, QueueState::Learning, 5),
      scheduled_card(3, 1, QueueState::Review, 0),
    ];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![3]);
  }

  #[test]
  fn test_suspended_and_inactive_never_selected() {
    let mut suspended = scheduled_card(1, 1, QueueState::Review, -10);
    suspended.suspended = true;
    let mut inactive = new_card(2, 1, 0, 0);
    inactive.is_active = false;
    let mut suspended_new = new_card(3, 1, 0, 0);
    suspended_new.suspended = true;
    let mut suspended_learning = scheduled_card(4, 1, QueueState::Relearning, -10);
    suspended_learning.suspended = true;
    let ok = scheduled_card(5, 1, QueueState::Review, -10);

    let cards = vec![suspended, inactive, suspended_new, suspended_learning, ok];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![5]);
  }

  #[test]
  fn test_out_of_scope_cards_skipped() {
    let cards = vec![new_card(1, 1, 0, 0), new_card(2, 2, 0, 0)];
    let queue = select_due(&cards, &BTreeSet::from([2]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert_eq!(ids(queue.iter()), vec![2]);
  }

  #[test]
  fn test_learning_first_policy() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      new_card(2, 1, 1, 0),
      scheduled_card(3, 1, QueueState::Review, -30),
      scheduled_card(4, 1, QueueState::Learning, -5),
      scheduled_card(5, 1, QueueState::Relearning, -20),
      scheduled_card(6, 1, QueueState::Review, -10),
      scheduled_card(7, 1, QueueState::Review, -1),
    ];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    // Learning by due time, then new/review alternating, then leftover reviews
    assert_eq!(ids(queue.iter()), vec![5, 4, 1, 3, 2, 6, 7]);
  }

  #[test]
  fn test_ratio_policy() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      new_card(2, 1, 1, 0),
      new_card(3, 1, 2, 0),
      scheduled_card(4, 1, QueueState::Review, -40),
      scheduled_card(5, 1, QueueState::Review, -30),
      scheduled_card(6, 1, QueueState::Review, -20),
      scheduled_card(7, 1, QueueState::Review, -10),
      scheduled_card(8, 1, QueueState::Learning, -5),
      scheduled_card(9, 1, QueueState::Learning, -1),
    ];
    let policy = InterleavePolicy::Ratio { new: 1, review: 2 };
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), policy);
    // [learning, new, review, review] cycles
    assert_eq!(ids(queue.iter()), vec![8, 1, 4, 5, 9, 2, 6, 7, 3]);
  }

  #[test]
  fn test_ratio_without_new_drains_new_last() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      scheduled_card(2, 1, QueueState::Review, -10),
      scheduled_card(3, 1, QueueState::Review, -5),
    ];
    let policy = InterleavePolicy::Ratio { new: 0, review: 1 };
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), policy);
    assert_eq!(ids(queue.iter()), vec![2, 3, 1]);
  }

  #[test]
  fn test_selection_is_restartable_and_idempotent() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      scheduled_card(2, 1, QueueState::Review, -10),
      scheduled_card(3, 1, QueueState::Learning, -3),
    ];
    let scope = BTreeSet::from([1]);
    let first = select_due(&cards, &scope, base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    let second = select_due(&cards, &scope, base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);

    assert_eq!(ids(first.iter()), ids(second.iter()));
    // Iterating twice yields the same sequence
    assert_eq!(ids(first.iter()), ids(first.iter()));
    assert_eq!(first.iter().len(), 3);
  }

  #[test]
  fn test_empty_selection() {
    let queue = select_due(&[], &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert!(queue.is_empty());
    assert!(queue.first().is_none());
    assert!(matches!(queue.require_non_empty(), Err(Error::EmptyScope)));
  }

  #[test]
  fn test_require_non_empty_passes_through() {
    let cards = vec![new_card(1, 1, 0, 0)];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    let queue = queue.require_non_empty().unwrap();
    assert_eq!(queue.first().map(|c| c.id), Some(1));
  }

  #[test]
  fn test_counts() {
    let cards = vec![
      new_card(1, 1, 0, 0),
      scheduled_card(2, 1, QueueState::Review, -10),
      scheduled_card(3, 1, QueueState::Learning, -3),
      scheduled_card(4, 1, QueueState::Relearning, -3),
    ];
    let queue = select_due(&cards, &BTreeSet::from([1]), base_time(), &limits(10, 10), InterleavePolicy::LearningFirst);
    assert_eq!(queue.counts(), DueCounts { new: 1, learning: 2, review: 1 });
    assert_eq!(queue.len(), 4);
  }

  #[test]
  fn test_session_limits_remaining() {
    let limits = limits(20, 100);
    assert_eq!(limits.remaining(5, 30), SessionLimits { new_cards: 15, review_cards: 70 });
    assert_eq!(limits.remaining(50, 300), SessionLimits { new_cards: 0, review_cards: 0 });
  }

  #[test]
  fn test_deck_overview_aggregates_subtrees() {
    let tree = DeckTree::new(vec![
      Deck::new(1, "Grammar", None),
      Deck::new(2, "Basic", Some(1)),
      Deck::new(3, "Vocab", None),
    ]);
    let cards = vec![
      new_card(1, 1, 0, 0),
      new_card(2, 2, 1, 0),
      scheduled_card(3, 2, QueueState::Review, -5),
      scheduled_card(4, 2, QueueState::Learning, -5),
      scheduled_card(5, 3, QueueState::Review, 60),
    ];
    let config = SchedulerConfig::default();
    let overview = deck_overview(&tree, &cards, base_time(), &config).unwrap();

    let rows: Vec<(DeckId, usize, DueCounts)> =
      overview.iter().map(|s| (s.deck_id, s.depth, s.counts)).collect();
    assert_eq!(
      rows,
      vec![
        (1, 0, DueCounts { new: 2, learning: 1, review: 1 }),
        (2, 1, DueCounts { new: 1, learning: 1, review: 1 }),
        (3, 0, DueCounts { new: 0, learning: 0, review: 0 }),
      ]
    );
    assert_eq!(overview[0].name, "Grammar");
  }
}
