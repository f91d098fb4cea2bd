//! Scheduler configuration and storage location.
//!
//! Every tunable used by the scheduler and the due-card selector lives in
//! [`SchedulerConfig`], which is passed explicitly into each call. Defaults
//! follow the classic SM-2 family of schedulers.

use serde::Deserialize;
use std::path::PathBuf;

use crate::db::LogOnError;
use crate::error::{Error, Result};

// ==================== File Configuration ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    database: Option<DatabaseConfig>,
    scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    path: Option<String>,
}

/// Config file read from the working directory
pub const CONFIG_FILE: &str = "config.toml";

/// Database used when neither config.toml nor the environment name one
pub const DEFAULT_DATABASE_PATH: &str = "data/flashdeck.db";

fn read_app_config() -> Option<AppConfig> {
    let contents = std::fs::read_to_string(CONFIG_FILE).ok()?;
    toml::from_str::<AppConfig>(&contents).log_warn("Ignoring malformed config.toml")
}

/// Load database path with priority: config.toml > .env > default
pub fn load_database_path() -> PathBuf {
    let _ = dotenvy::dotenv();

    if let Some(path) = read_app_config()
        .and_then(|c| c.database)
        .and_then(|db| db.path)
    {
        tracing::info!("Using database from {}: {}", CONFIG_FILE, path);
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("DATABASE_PATH") {
        tracing::info!("Using database from DATABASE_PATH env: {}", path);
        return PathBuf::from(path);
    }

    let default = PathBuf::from(DEFAULT_DATABASE_PATH);
    tracing::info!("Using default database path: {}", default.display());
    default
}

/// Load the `[scheduler]` table of config.toml, falling back to defaults
pub fn load_scheduler_config() -> Result<SchedulerConfig> {
    let config = read_app_config()
        .and_then(|c| c.scheduler)
        .unwrap_or_default();
    config.validate()?;
    Ok(config)
}

/// Parse a full config.toml document and return its scheduler section
pub fn scheduler_config_from_toml(contents: &str) -> Result<SchedulerConfig> {
    let app: AppConfig =
        toml::from_str(contents).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let config = app.scheduler.unwrap_or_default();
    config.validate()?;
    Ok(config)
}

// ==================== Scheduling Constants ====================

/// Reviews this far ahead of `next_due` are still considered on time
pub const EARLY_REVIEW_GRACE_SECS: i64 = 60;

/// Intervals shorter than this many days are never fuzzed
pub const MIN_FUZZ_INTERVAL_DAYS: u32 = 3;

/// Largest interval a stored card may carry; anything above is corrupt
pub const MAX_STORED_INTERVAL_DAYS: u32 = 1_000_000;

// ==================== Scheduler Configuration ====================

/// How due Learning/Relearning cards are mixed with New and Review cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterleavePolicy {
    /// Every due learning card first, then New and Review one-for-one
    #[default]
    LearningFirst,
    /// Cycles of one learning card, `new` New cards, `review` Review cards
    Ratio { new: u32, review: u32 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub new_cards_per_session: u32,
    pub review_cards_per_session: u32,
    /// Learning steps in minutes
    pub learning_steps_mins: Vec<u32>,
    /// Relearning steps in minutes
    pub relearning_steps_mins: Vec<u32>,
    /// Fixed-point percentage: 250 = 2.50x
    pub starting_ease: u32,
    pub ease_floor: u32,
    pub easy_bonus: f64,
    pub hard_interval_multiplier: f64,
    pub lapse_penalty_factor: f64,
    pub interval_fuzz_range_percent: f64,
    pub interleave_policy: InterleavePolicy,
    pub graduating_interval_days: u32,
    pub easy_interval_days: u32,
    pub easy_ease_bonus: u32,
    pub hard_ease_penalty: u32,
    pub lapse_ease_penalty: u32,
    pub maximum_interval_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            new_cards_per_session: 20,
            review_cards_per_session: 200,
            learning_steps_mins: vec![1, 10],
            relearning_steps_mins: vec![10],
            starting_ease: 250,
            ease_floor: 130,
            easy_bonus: 1.3,
            hard_interval_multiplier: 1.2,
            lapse_penalty_factor: 0.5,
            interval_fuzz_range_percent: 5.0,
            interleave_policy: InterleavePolicy::LearningFirst,
            graduating_interval_days: 1,
            easy_interval_days: 4,
            easy_ease_bonus: 15,
            hard_ease_penalty: 15,
            lapse_ease_penalty: 20,
            maximum_interval_days: 36500,
        }
    }
}

impl SchedulerConfig {
    /// Same defaults with fuzz disabled, for reproducible intervals
    pub fn without_fuzz() -> Self {
        Self {
            interval_fuzz_range_percent: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.learning_steps_mins.is_empty() {
            return invalid("learning_steps_mins must contain at least one step");
        }
        if self.relearning_steps_mins.is_empty() {
            return invalid("relearning_steps_mins must contain at least one step");
        }
        if self.ease_floor == 0 || self.ease_floor > self.starting_ease {
            return invalid("ease_floor must be positive and at most starting_ease");
        }
        if !(self.easy_bonus >= 1.0) {
            return invalid("easy_bonus must be at least 1.0");
        }
        if !(self.hard_interval_multiplier > 0.0) {
            return invalid("hard_interval_multiplier must be positive");
        }
        if !(self.lapse_penalty_factor >= 0.0) {
            return invalid("lapse_penalty_factor must not be negative");
        }
        if !(self.interval_fuzz_range_percent >= 0.0) {
            return invalid("interval_fuzz_range_percent must not be negative");
        }
        if self.graduating_interval_days == 0 || self.easy_interval_days == 0 {
            return invalid("graduating and easy intervals must be at least one day");
        }
        if self.maximum_interval_days == 0 || self.maximum_interval_days > MAX_STORED_INTERVAL_DAYS {
            return invalid("maximum_interval_days must be between 1 and 1000000 days");
        }
        if self.interleave_policy == (InterleavePolicy::Ratio { new: 0, review: 0 }) {
            return invalid("interleave ratio must include at least one card");
        }
        Ok(())
    }

    /// Duration of a learning (or relearning) step, clamped to the last step
    pub fn step_minutes(&self, relearning: bool, step: u32) -> u32 {
        let steps = if relearning {
            &self.relearning_steps_mins
        } else {
            &self.learning_steps_mins
        };
        let idx = (step as usize).min(steps.len().saturating_sub(1));
        steps.get(idx).copied().unwrap_or(1)
    }
}
