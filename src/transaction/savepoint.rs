//! Savepoint handling for NESTED propagation.
//!
//! A nested context shares its enclosing physical transaction and marks its
//! starting point with a savepoint. Rolling the nested context back returns
//! the connection to that point; committing it just drops the marker.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::storage::{PhysicalConnection, StorageBackend, StorageError};
use crate::transaction::error::{TransactionError, TransactionResult};

/// Name of a savepoint on a physical connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SavepointId(String);

impl SavepointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates, rolls back to and releases savepoints.
#[derive(Debug)]
pub struct SavepointCoordinator {
    supported: bool,
    backend: String,
    counter: AtomicU64,
}

impl SavepointCoordinator {
    pub fn new(backend: &dyn StorageBackend) -> Self {
        Self {
            supported: backend.supports_savepoints(),
            backend: backend.name().to_string(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Set a new savepoint on the connection.
    pub fn create_savepoint(
        &self,
        connection: &mut dyn PhysicalConnection,
    ) -> TransactionResult<SavepointId> {
        if !self.supported {
            return Err(self.unsupported());
        }
        let id = SavepointId(format!(
            "SAVEPOINT_{}",
            self.counter.fetch_add(1, Ordering::Relaxed) + 1
        ));
        connection
            .create_savepoint(id.as_str())
            .map_err(|e| self.map_error(e))?;
        debug!(connection = %connection.id(), savepoint = %id, "savepoint created");
        Ok(id)
    }

    /// Undo the work done after the savepoint, then drop it.
    pub fn rollback_to_savepoint(
        &self,
        connection: &mut dyn PhysicalConnection,
        savepoint: &SavepointId,
    ) -> TransactionResult<()> {
        connection
            .rollback_to_savepoint(savepoint.as_str())
            .map_err(|e| self.map_error(e))?;
        connection
            .release_savepoint(savepoint.as_str())
            .map_err(|e| self.map_error(e))?;
        debug!(connection = %connection.id(), %savepoint, "rolled back to savepoint");
        Ok(())
    }

    /// Keep the work and drop the savepoint.
    pub fn release_savepoint(
        &self,
        connection: &mut dyn PhysicalConnection,
        savepoint: &SavepointId,
    ) -> TransactionResult<()> {
        connection
            .release_savepoint(savepoint.as_str())
            .map_err(|e| self.map_error(e))?;
        debug!(connection = %connection.id(), %savepoint, "savepoint released");
        Ok(())
    }

    fn unsupported(&self) -> TransactionError {
        TransactionError::SavepointUnsupported {
            backend: self.backend.clone(),
        }
    }

    fn map_error(&self, error: StorageError) -> TransactionError {
        match error {
            StorageError::SavepointsUnsupported => self.unsupported(),
            other => TransactionError::Storage(other),
        }
    }
}
