//! Transaction management for the transfer engine.
//!
//! This module implements propagation, isolation, rollback rules, timeouts
//! and savepoint nesting over any [`StorageBackend`](crate::storage::StorageBackend).
//! There is no implicit interception: every transactional call takes the
//! caller's [`TransactionChain`] explicitly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │  (propagation rules, completion, timeouts, tracking)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │ Transaction │       │  Savepoint  │
//!  │   Chain     │       │  Context    │       │ Coordinator │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use bank_transfer::storage::MemoryBackend;
//! use bank_transfer::transaction::{
//!     IsolationLevel, Propagation, TransactionDefinition, TransactionManager,
//! };
//!
//! let manager = TransactionManager::new(MemoryBackend::new());
//! let mut chain = manager.chain();
//!
//! let definition = TransactionDefinition::new(Propagation::Required)
//!     .isolation(IsolationLevel::ReadCommitted);
//! let tx = manager.begin(&mut chain, &definition).unwrap();
//!
//! // Perform operations through repositories using `chain`
//!
//! let outcome = manager.complete(&mut chain, &tx, None).unwrap();
//! assert!(outcome.is_committed());
//! ```

mod chain;
mod context;
mod error;
mod isolation;
mod manager;
mod propagation;
mod rollback;
mod savepoint;

pub use chain::TransactionChain;
pub use context::{
    CompletionOutcome, ContextRole, RollbackOrigin, RollbackReason, TransactionContext,
    TransactionDefinition, TransactionHandle, TransactionStatus, TIMEOUT_DEFAULT,
};
pub use error::{TransactionError, TransactionResult};
pub use isolation::IsolationLevel;
pub use manager::{ManagerConfig, TransactionManager, TransactionMetadata, TransactionStats};
pub use propagation::Propagation;
pub use rollback::{Classify, FailureClass, FailureKind, RollbackRule};
pub use savepoint::{SavepointCoordinator, SavepointId};
