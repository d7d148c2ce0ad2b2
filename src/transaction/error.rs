//! Transaction error types.

use thiserror::Error;

use crate::storage::StorageError;
use crate::transaction::isolation::IsolationLevel;
use crate::transaction::rollback::{Classify, FailureKind};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// MANDATORY propagation without a transaction in progress.
    #[error("no existing transaction found for propagation MANDATORY")]
    NoActiveTransaction,

    /// NEVER propagation with a transaction in progress.
    #[error("existing transaction {tx_id} found for propagation NEVER")]
    UnexpectedActiveTransaction { tx_id: String },

    /// NESTED propagation against a backend without savepoints.
    #[error("nested transaction requested but backend '{backend}' does not support savepoints")]
    SavepointUnsupported { backend: String },

    /// Transaction deadline passed; the transaction has been rolled back.
    #[error("transaction {tx_id} timed out after {timeout_secs}s and was rolled back")]
    Timeout { tx_id: String, timeout_secs: i64 },

    /// A participant requested an isolation level the running transaction does not have.
    #[error("participating transaction requested {requested} but existing transaction runs at {existing}")]
    IncompatibleIsolation {
        requested: IsolationLevel,
        existing: IsolationLevel,
    },

    /// Timeout below -1.
    #[error("invalid transaction timeout: {0}s")]
    InvalidTimeout(i64),

    /// `complete` was called for a context that is not the innermost one.
    #[error("transaction {tx_id} cannot complete while inner transaction {innermost} is still open")]
    OutOfOrderCompletion { tx_id: String, innermost: String },

    /// The handle does not refer to an open context on this chain.
    #[error("transaction not found: {0}")]
    UnknownContext(String),

    /// The chain was created by a different manager.
    #[error("transaction chain {0} belongs to a different transaction manager")]
    ForeignChain(String),

    /// The work succeeded but a participant forced the transaction to roll back.
    #[error("transaction {tx_id} rolled back because it was marked rollback-only")]
    UnexpectedRollback { tx_id: String },

    /// Internal error.
    #[error("internal transaction error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::Storage(e) => e.is_retriable(),
            TransactionError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Misuse of the propagation rules. Never worth retrying.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            TransactionError::NoActiveTransaction
                | TransactionError::UnexpectedActiveTransaction { .. }
                | TransactionError::SavepointUnsupported { .. }
                | TransactionError::IncompatibleIsolation { .. }
                | TransactionError::OutOfOrderCompletion { .. }
                | TransactionError::UnknownContext(_)
                | TransactionError::ForeignChain(_)
        )
    }
}

impl Classify for TransactionError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            TransactionError::Storage(_) => FailureKind::fatal("StorageFailure"),
            TransactionError::NoActiveTransaction => FailureKind::unchecked("NoActiveTransaction"),
            TransactionError::UnexpectedActiveTransaction { .. } => {
                FailureKind::unchecked("UnexpectedActiveTransaction")
            }
            TransactionError::SavepointUnsupported { .. } => {
                FailureKind::unchecked("SavepointUnsupported")
            }
            TransactionError::Timeout { .. } => FailureKind::unchecked("TransactionTimeout"),
            TransactionError::UnexpectedRollback { .. } => {
                FailureKind::unchecked("UnexpectedRollback")
            }
            _ => FailureKind::unchecked("IllegalTransactionState"),
        }
    }
}
