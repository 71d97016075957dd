//! Storage error types.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The requested record does not exist.
    #[error("record not found")]
    NotFound,

    /// A session increment was refused because the weekly quota is spent.
    #[error("weekly session limit reached at {count} sessions")]
    WeeklyLimitReached {
        /// The weekly count observed when the increment was refused.
        count: u32,
    },
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
