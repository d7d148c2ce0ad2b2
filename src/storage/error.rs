//! Storage layer error types
//!
//! All errors a storage backend can raise are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// no connection became free before the acquire timeout
    #[error("connection pool exhausted: no connection available after {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    /// first-committer-wins check failed at commit time
    #[error("write conflict on {table}/{key}: row was changed by a concurrent transaction")]
    WriteConflict { table: String, key: String },

    /// the backend has no savepoint capability
    #[error("savepoints are not supported by this backend")]
    SavepointsUnsupported,

    /// the named savepoint does not exist on this connection
    #[error("savepoint not found: {0}")]
    SavepointNotFound(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// a fault armed through the backend's fault injection hooks
    #[error("injected fault on {table}/{key}")]
    InjectedFault { table: String, key: String },

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error is a conflict with a concurrent transaction
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::WriteConflict { .. })
    }

    /// check if this error is recoverable by retrying the whole unit of work
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StorageError::WriteConflict { .. } | StorageError::PoolExhausted { .. }
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
