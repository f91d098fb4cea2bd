pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod session;
pub mod srs;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use session::{AnsweredCard, CardStore, ReviewSession, SessionSummary};
