//! SM-2 style scheduling with learning steps.
//!
//! `schedule` maps (state, grade, now) to the next state and does nothing
//! else. Ease is integer fixed-point (250 = 2.50x) so repeated reviews never
//! accumulate floating-point drift; day intervals round half up.
//!
//! State machine:
//! - New: first answer always lands in Learning. Again/Hard start at step 0,
//!   Good/Easy skip to step 1.
//! - Learning: Again restarts the steps, Hard repeats the step, Good advances
//!   and graduates to Review after the last step, Easy graduates immediately.
//! - Review: Again lapses into Relearning, Hard/Good/Easy grow the interval.
//! - Relearning: same steps logic, graduating back to Review with the
//!   pre-lapse interval scaled by the lapse penalty.

use chrono::{DateTime, Duration, Utc};

use super::fuzz::{apply_fuzz, fuzz_seed};
use crate::config::{SchedulerConfig, EARLY_REVIEW_GRACE_SECS, MAX_STORED_INTERVAL_DAYS};
use crate::domain::{Card, Grade, QueueState, SchedulingState};
use crate::error::{Error, Result};

/// Schedule a graded review of a card, refusing suspended or inactive cards
pub fn schedule_card(
  card: &Card,
  grade: Grade,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<SchedulingState> {
  if card.suspended {
    return Err(Error::InvalidState(format!(
      "card {} is suspended and must be unsuspended before review",
      card.id
    )));
  }
  if !card.is_active {
    return Err(Error::InvalidState(format!("card {} is inactive", card.id)));
  }
  schedule(&card.schedule, grade, now, config)
}

/// Compute the state that follows `grade` at `now`
pub fn schedule(
  state: &SchedulingState,
  grade: Grade,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<SchedulingState> {
  check_invariants(state)?;

  if let Some(due) = state.next_due {
    if now < due - Duration::seconds(EARLY_REVIEW_GRACE_SECS) {
      tracing::debug!("Early review: due {}, reviewed {}", due, now);
    }
  }

  let mut next = state.clone();
  next.ease_factor = state.ease_factor.max(config.ease_floor);
  next.reps = state.reps.saturating_add(1);

  match state.queue {
    QueueState::New => first_answer(&mut next, grade, now, config),
    QueueState::Learning => answer_step(&mut next, grade, now, config, false),
    QueueState::Relearning => answer_step(&mut next, grade, now, config, true),
    QueueState::Review => answer_review(&mut next, state, grade, now, config),
  }

  tracing::debug!(
    "{} {:?} -> {} (step {}, interval {}d, ease {})",
    state.queue.as_str(),
    grade,
    next.queue.as_str(),
    next.learning_step,
    next.interval_days,
    next.ease_factor
  );
  Ok(next)
}

/// Next state for every grade, e.g. to label answer buttons
pub fn preview(
  state: &SchedulingState,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<Vec<(Grade, SchedulingState)>> {
  Grade::ALL
    .into_iter()
    .map(|grade| schedule(state, grade, now, config).map(|next| (grade, next)))
    .collect()
}

fn check_invariants(state: &SchedulingState) -> Result<()> {
  if state.interval_days > MAX_STORED_INTERVAL_DAYS {
    return Err(Error::InvalidState(format!(
      "interval of {} days is out of range",
      state.interval_days
    )));
  }
  match state.queue {
    QueueState::Review | QueueState::Relearning if state.interval_days < 1 => {
      Err(Error::InvalidState(format!(
        "{} card with interval {} days",
        state.queue.as_str(),
        state.interval_days
      )))
    }
    QueueState::New => Ok(()),
    _ if state.next_due.is_none() => Err(Error::InvalidState(format!(
      "{} card without a due time",
      state.queue.as_str()
    ))),
    _ => Ok(()),
  }
}

fn first_answer(next: &mut SchedulingState, grade: Grade, now: DateTime<Utc>, config: &SchedulerConfig) {
  let last_step = config.learning_steps_mins.len().saturating_sub(1) as u32;
  let step = match grade {
    Grade::Again | Grade::Hard => 0,
    Grade::Good | Grade::Easy => 1.min(last_step),
  };
  next.queue = QueueState::Learning;
  set_step(next, step, now, config, false);
}

fn answer_step(
  next: &mut SchedulingState,
  grade: Grade,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
  relearning: bool,
) {
  let steps = if relearning {
    config.relearning_steps_mins.len()
  } else {
    config.learning_steps_mins.len()
  } as u32;
  let current = next.learning_step.min(steps.saturating_sub(1));

  match grade {
    Grade::Again => set_step(next, 0, now, config, relearning),
    Grade::Hard => set_step(next, current, now, config, relearning),
    Grade::Good if current + 1 < steps => set_step(next, current + 1, now, config, relearning),
    Grade::Good => graduate(next, false, now, config, relearning),
    Grade::Easy => graduate(next, true, now, config, relearning),
  }
}

fn set_step(next: &mut SchedulingState, step: u32, now: DateTime<Utc>, config: &SchedulerConfig, relearning: bool) {
  let minutes = config.step_minutes(relearning, step);
  next.learning_step = step;
  next.next_due = Some(now + Duration::minutes(minutes as i64));
}

fn graduate(next: &mut SchedulingState, easy: bool, now: DateTime<Utc>, config: &SchedulerConfig, relearning: bool) {
  let interval = if relearning {
    let scaled = round_half_up(next.interval_days as f64 * config.lapse_penalty_factor);
    scaled.max(1)
  } else if easy {
    next.ease_factor = config.starting_ease + config.easy_ease_bonus;
    config.easy_interval_days
  } else {
    next.ease_factor = config.starting_ease;
    config.graduating_interval_days
  };
  let interval = interval.min(config.maximum_interval_days);

  next.queue = QueueState::Review;
  next.learning_step = 0;
  next.interval_days = interval;
  next.next_due = Some(now + Duration::days(interval as i64));
}

fn answer_review(
  next: &mut SchedulingState,
  prev: &SchedulingState,
  grade: Grade,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) {
  let interval = prev.interval_days;
  let ease = next.ease_factor;
  let longer = interval.saturating_add(1);
  let hard = round_half_up(interval as f64 * config.hard_interval_multiplier).max(longer);
  let good = u32::try_from((interval as u64 * ease as u64 + 50) / 100).unwrap_or(u32::MAX);
  let good = good.max(longer);

  let (raw, minimum) = match grade {
    Grade::Again => {
      next.lapses = prev.lapses.saturating_add(1);
      next.ease_factor = lower_ease(ease, config.lapse_ease_penalty, config.ease_floor);
      next.queue = QueueState::Relearning;
      // interval_days keeps the pre-lapse interval until relearning completes
      set_step(next, 0, now, config, true);
      return;
    }
    Grade::Hard => {
      next.ease_factor = lower_ease(ease, config.hard_ease_penalty, config.ease_floor);
      (hard, longer)
    }
    Grade::Good => (good, longer),
    Grade::Easy => {
      next.ease_factor = ease.saturating_add(config.easy_ease_bonus);
      let easy = round_half_up(interval as f64 * ease as f64 / 100.0 * config.easy_bonus).max(good);
      (easy, good)
    }
  };

  // A cap lowered after the fact never shortens an existing interval
  let max = config.maximum_interval_days.max(interval);
  let fuzzed = apply_fuzz(
    raw.min(max),
    minimum,
    max,
    config.interval_fuzz_range_percent,
    fuzz_seed(prev, now),
  );

  next.queue = QueueState::Review;
  next.interval_days = fuzzed;
  next.next_due = Some(now + Duration::days(fuzzed as i64));
}

fn lower_ease(ease: u32, penalty: u32, floor: u32) -> u32 {
  ease.saturating_sub(penalty).max(floor)
}

fn round_half_up(value: f64) -> u32 {
  (value + 0.5).floor().max(0.0) as u32
}
