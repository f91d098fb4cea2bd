//! Interval fuzz.
//!
//! Spreads cards that would otherwise land on the same day. The random draw is
//! seeded from the review inputs, so the same review always fuzzes the same way
//! and the scheduler stays a pure function.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::MIN_FUZZ_INTERVAL_DAYS;
use crate::domain::SchedulingState;

/// Seed for one review of one card
pub fn fuzz_seed(state: &SchedulingState, now: DateTime<Utc>) -> u64 {
  let time = now.timestamp() as u64;
  let card = ((state.reps as u64) << 32) | state.interval_days as u64;
  time.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ card.rotate_left(17) ^ state.lapses as u64
}

/// Spread `interval` by up to `percent` of itself in either direction.
///
/// The result stays within `[min, max]`. Intervals under
/// [`MIN_FUZZ_INTERVAL_DAYS`] and spreads that round to zero days are left alone.
pub fn apply_fuzz(interval: u32, min: u32, max: u32, percent: f64, seed: u64) -> u32 {
  let min = min.min(max);
  let clamp = |days: i64| days.clamp(min as i64, max as i64) as u32;

  if percent <= 0.0 || interval < MIN_FUZZ_INTERVAL_DAYS {
    return clamp(interval as i64);
  }

  let spread = (interval as f64 * percent / 100.0 + 0.5).floor() as i64;
  if spread == 0 {
    return clamp(interval as i64);
  }

  let mut rng = StdRng::seed_from_u64(seed);
  let delta = rng.random_range(-spread..=spread);
  clamp(interval as i64 + delta)
}
