pub mod fuzz;
pub mod scheduler;
pub mod selector;

pub use scheduler::{preview, schedule, schedule_card};
pub use selector::{deck_overview, select_due, DeckSummary, DueCounts, DueQueue, SessionLimits};
