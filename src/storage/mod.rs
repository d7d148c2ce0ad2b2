//! storage layer for the transfer engine
//!
//! this module defines the contract between the transaction manager and
//! whatever store actually keeps the rows. The upper layers (transaction
//! manager, account repository) use this API and never touch a concrete
//! store directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                          │
//! │      (connection acquisition, savepoint capability)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ connect(isolation)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PhysicalConnection                        │
//! │  (get/put rows, commit, rollback, savepoints)               │
//! └─────────────────────────────────────────────────────────────┘
//!  ```
//!
//! # Usage
//!
//! ```
//! use bank_transfer::storage::{MemoryBackend, StorageBackend};
//! use bank_transfer::transaction::IsolationLevel;
//! use serde_json::json;
//!
//! let backend = MemoryBackend::new();
//! let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
//! conn.put("accounts", "1", json!({"balance": "100"})).unwrap();
//! conn.commit().unwrap();
//! assert!(backend.read_committed("accounts", "1").is_some());
//! ```

mod backend;
mod error;
mod memory;

// Re-export public API
pub use backend::{ConnectionId, PhysicalConnection, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryBackend, MemoryBackendConfig};
