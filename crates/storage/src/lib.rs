//! Storage Layer
//!
//! Durable backings for the location store, alert recorder, and hazard
//! index, behind trait boundaries. Two implementations: an in-memory store
//! for tests and single-node defaults, and SQLite via `sqlx` for
//! deployments that need persistence across restarts.

mod memory;
mod sqlite;
mod traits;

pub use memory::{InMemoryAlertStore, InMemoryFixStore, InMemoryTelemetryStore, InMemoryZoneStore};
pub use sqlite::SqliteStore;
pub use traits::{AlertFilter, AlertStore, FixStore, TelemetryStore, ZoneStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}
