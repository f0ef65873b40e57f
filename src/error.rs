use thiserror::Error;

/// Errors raised by a key-value store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid cursor {cursor} for pattern '{pattern}'")]
    InvalidCursor { cursor: u64, pattern: String },
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

/// Conditions an eviction run can hit.
///
/// Only `NoOp` is returned as an `Err` from an eviction; the rest are
/// folded into the run summary as a `Partial` status or an index outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvictError {
    #[error("Refusing to evict namespace '{namespace}': {reason}")]
    NoOp { namespace: String, reason: String },
    #[error("Scan failed: {0}")]
    ScanFailed(StoreError),
    #[error("Delete failed: {0}")]
    DeleteFailed(StoreError),
    #[error("Eviction cancelled")]
    Cancelled,
    #[error("Index cleanup failed: {0}")]
    IndexCleanupFailed(StoreError),
    #[error("Eviction task failed: {0}")]
    TaskFailed(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
