pub mod cards;
pub mod decks;
pub mod notes;
pub mod reviews;
pub mod schema;
pub mod store;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

// Re-export all public items from submodules
pub use cards::*;
pub use decks::*;
pub use notes::*;
pub use reviews::*;
pub use schema::run_migrations;
pub use store::SqliteStore;

pub type DbPool = Arc<Mutex<Connection>>;

/// Turns a non-fatal failure into a warning
pub trait LogOnError<T> {
    fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        self.map_err(|e| tracing::warn!("{}: {}", context, e)).ok()
    }
}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>> {
    pool.lock().map_err(|_| {
        tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
        Error::LockPoisoned
    })
}

pub fn init_db(path: &Path) -> Result<DbPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).log_warn("Could not create database directory");
    }

    let conn = Connection::open(path)?;
    prepare_connection(&conn)?;
    tracing::info!("Opened database {}", path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_in_memory() -> Result<DbPool> {
    let conn = Connection::open_in_memory()?;
    prepare_connection(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn prepare_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    run_migrations(conn)?;
    Ok(())
}

/// Unix seconds to UTC, as a column conversion
pub(crate) fn timestamp_to_datetime(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

/// Wrap a domain decoding failure as a column conversion error
pub(crate) fn conversion_error(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
