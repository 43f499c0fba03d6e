//! Error types for the store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Rejected input.
    #[error("invalid {0}")]
    Invalid(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    Lock,
}
