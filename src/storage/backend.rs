//! The storage backend contract.
//!
//! The transaction manager never talks to a concrete store directly. It
//! acquires [`PhysicalConnection`]s from a [`StorageBackend`] and drives
//! begin/commit/rollback and savepoints through them. Rows are addressed by
//! `(table, key)` and carried as JSON values.

use std::fmt;

use serde_json::Value;

use crate::storage::error::StorageResult;
use crate::transaction::IsolationLevel;

/// Identifier of one physical connection, unique per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A store that hands out transactional connections.
///
/// Implementations must be shareable across threads; each connection they
/// return is owned by exactly one transaction chain at a time.
pub trait StorageBackend: Send + Sync {
    /// Acquire a connection and open a physical transaction on it.
    ///
    /// May block until the connection pool has a free slot.
    fn connect(&self, isolation: IsolationLevel) -> StorageResult<Box<dyn PhysicalConnection>>;

    /// Whether connections from this backend can create savepoints.
    fn supports_savepoints(&self) -> bool;

    /// Short name used in log output.
    fn name(&self) -> &str;
}

/// One open physical transaction.
///
/// Dropping a connection without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must discard its work and return it to the pool.
pub trait PhysicalConnection: Send {
    fn id(&self) -> ConnectionId;

    /// Isolation level the physical transaction was opened with.
    fn isolation(&self) -> IsolationLevel;

    /// Read a row, seeing this connection's own uncommitted writes.
    fn get(&mut self, table: &str, key: &str) -> StorageResult<Option<Value>>;

    /// Write a row. Visible to other connections only after commit.
    fn put(&mut self, table: &str, key: &str, value: Value) -> StorageResult<()>;

    fn commit(self: Box<Self>) -> StorageResult<()>;

    fn rollback(self: Box<Self>) -> StorageResult<()>;

    fn create_savepoint(&mut self, name: &str) -> StorageResult<()>;

    /// Undo everything written after the savepoint. The savepoint itself survives.
    fn rollback_to_savepoint(&mut self, name: &str) -> StorageResult<()>;

    /// Discard the savepoint marker (and any created after it), keeping the work.
    fn release_savepoint(&mut self, name: &str) -> StorageResult<()>;
}

impl fmt::Debug for dyn PhysicalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalConnection")
            .field("id", &self.id())
            .field("isolation", &self.isolation())
            .finish()
    }
}
