//! In-memory storage backend.
//!
//! Committed rows live in a shared map. Every connection keeps its own write
//! log which is applied atomically on commit, so uncommitted work is never
//! visible to other connections. Savepoints are positions in the write log.
//!
//! Lost updates are prevented with a first-committer-wins check: each row
//! remembers a version, a connection records the version it first observed,
//! and commit fails with [`StorageError::WriteConflict`] if a row it wrote
//! (or, under SERIALIZABLE, any row it read) has moved on since.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::storage::backend::{ConnectionId, PhysicalConnection, StorageBackend};
use crate::storage::error::{StorageError, StorageResult};
use crate::transaction::IsolationLevel;

type RowId = (String, String);

/// Configuration for [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBackendConfig {
    /// Maximum number of connections open at once.
    pub pool_size: usize,
    /// How long `connect` waits for a free connection.
    pub acquire_timeout_ms: u64,
    /// Whether connections can create savepoints.
    pub savepoints: bool,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            acquire_timeout_ms: 30_000,
            savepoints: true,
        }
    }
}

impl MemoryBackendConfig {
    /// Set the pool size (at least one).
    pub fn pool_size(mut self, value: usize) -> Self {
        self.pool_size = value.max(1);
        self
    }

    /// Set the acquire timeout in milliseconds.
    pub fn acquire_timeout_ms(mut self, value: u64) -> Self {
        self.acquire_timeout_ms = value;
        self
    }

    /// Enable or disable savepoint support.
    pub fn savepoints(mut self, value: bool) -> Self {
        self.savepoints = value;
        self
    }
}

#[derive(Debug, Clone)]
struct VersionedRow {
    value: Value,
    version: u64,
}

/// In-memory backend with a bounded, blocking connection pool.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    config: MemoryBackendConfig,
    rows: RwLock<HashMap<RowId, VersionedRow>>,
    /// Connections currently checked out.
    in_use: Mutex<usize>,
    released: Condvar,
    /// Rows whose next write fails once.
    faults: Mutex<HashSet<RowId>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryBackendConfig::default())
    }

    /// Create an empty backend.
    pub fn with_config(config: MemoryBackendConfig) -> Self {
        let config = MemoryBackendConfig {
            pool_size: config.pool_size.max(1),
            ..config
        };
        Self {
            inner: Arc::new(MemoryInner {
                config,
                rows: RwLock::new(HashMap::new()),
                in_use: Mutex::new(0),
                released: Condvar::new(),
                faults: Mutex::new(HashSet::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &MemoryBackendConfig {
        &self.inner.config
    }

    /// Read the last committed value of a row, outside any transaction.
    pub fn read_committed(&self, table: &str, key: &str) -> Option<Value> {
        self.inner
            .rows
            .read()
            .get(&(table.to_string(), key.to_string()))
            .map(|row| row.value.clone())
    }

    /// Number of committed rows across all tables.
    pub fn row_count(&self) -> usize {
        self.inner.rows.read().len()
    }

    /// Number of connections currently checked out of the pool.
    pub fn in_use(&self) -> usize {
        *self.inner.in_use.lock()
    }

    /// Make the next write to `table/key` fail with [`StorageError::InjectedFault`].
    pub fn inject_write_fault(&self, table: &str, key: &str) {
        self.inner
            .faults
            .lock()
            .insert((table.to_string(), key.to_string()));
    }

    fn acquire_slot(&self) -> StorageResult<()> {
        let config = &self.inner.config;
        // An acquire timeout too large for `Instant` waits indefinitely
        let deadline = Instant::now().checked_add(Duration::from_millis(config.acquire_timeout_ms));
        let mut in_use = self.inner.in_use.lock();
        while *in_use >= config.pool_size {
            let Some(deadline) = deadline else {
                self.inner.released.wait(&mut in_use);
                continue;
            };
            let result = self.inner.released.wait_until(&mut in_use, deadline);
            if result.timed_out() && *in_use >= config.pool_size {
                return Err(StorageError::PoolExhausted {
                    waited_ms: config.acquire_timeout_ms,
                });
            }
        }
        *in_use += 1;
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("rows", &self.row_count())
            .field("in_use", &self.in_use())
            .field("pool_size", &self.inner.config.pool_size)
            .finish()
    }
}

impl StorageBackend for MemoryBackend {
    fn connect(&self, isolation: IsolationLevel) -> StorageResult<Box<dyn PhysicalConnection>> {
        self.acquire_slot()?;

        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let snapshot = if isolation.uses_snapshot() {
            Some(self.inner.rows.read().clone())
        } else {
            None
        };
        trace!(connection = %id, %isolation, "physical transaction opened");

        Ok(Box::new(MemoryConnection {
            id,
            isolation,
            inner: self.inner.clone(),
            snapshot,
            writes: Vec::new(),
            observed: HashMap::new(),
            savepoints: Vec::new(),
            finished: false,
        }))
    }

    fn supports_savepoints(&self) -> bool {
        self.inner.config.savepoints
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryConnection {
    id: ConnectionId,
    isolation: IsolationLevel,
    inner: Arc<MemoryInner>,
    /// Committed state at begin, for snapshot isolation levels.
    snapshot: Option<HashMap<RowId, VersionedRow>>,
    writes: Vec<(RowId, Value)>,
    /// Version of each row when this connection first touched it.
    observed: HashMap<RowId, u64>,
    /// Savepoint name and write-log length at creation.
    savepoints: Vec<(String, usize)>,
    finished: bool,
}

impl MemoryConnection {
    fn visible(&self, row_id: &RowId) -> Option<VersionedRow> {
        match &self.snapshot {
            Some(snapshot) => snapshot.get(row_id).cloned(),
            None => self.inner.rows.read().get(row_id).cloned(),
        }
    }

    fn observe(&mut self, row_id: &RowId, row: Option<&VersionedRow>) {
        if !self.observed.contains_key(row_id) {
            self.observed
                .insert(row_id.clone(), row.map_or(0, |r| r.version));
        }
    }

    fn savepoint_position(&self, name: &str) -> StorageResult<usize> {
        if !self.inner.config.savepoints {
            return Err(StorageError::SavepointsUnsupported);
        }
        self.savepoints
            .iter()
            .rposition(|(sp, _)| sp == name)
            .ok_or_else(|| StorageError::SavepointNotFound(name.to_string()))
    }

    fn check_conflicts(&self, rows: &HashMap<RowId, VersionedRow>) -> StorageResult<()> {
        let written: HashSet<&RowId> = self.writes.iter().map(|(id, _)| id).collect();
        for (row_id, seen) in &self.observed {
            if self.isolation != IsolationLevel::Serializable && !written.contains(row_id) {
                continue;
            }
            let current = rows.get(row_id).map_or(0, |r| r.version);
            if current != *seen {
                return Err(StorageError::WriteConflict {
                    table: row_id.0.clone(),
                    key: row_id.1.clone(),
                });
            }
        }
        Ok(())
    }
}

impl PhysicalConnection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    fn get(&mut self, table: &str, key: &str) -> StorageResult<Option<Value>> {
        let row_id = (table.to_string(), key.to_string());
        if let Some((_, value)) = self.writes.iter().rev().find(|(id, _)| *id == row_id) {
            return Ok(Some(value.clone()));
        }
        let row = self.visible(&row_id);
        self.observe(&row_id, row.as_ref());
        Ok(row.map(|r| r.value))
    }

    fn put(&mut self, table: &str, key: &str, value: Value) -> StorageResult<()> {
        let row_id = (table.to_string(), key.to_string());
        if self.inner.faults.lock().remove(&row_id) {
            return Err(StorageError::InjectedFault {
                table: row_id.0,
                key: row_id.1,
            });
        }
        if !self.observed.contains_key(&row_id) {
            let row = self.visible(&row_id);
            self.observe(&row_id, row.as_ref());
        }
        self.writes.push((row_id, value));
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.finished = true;
        let inner = self.inner.clone();
        let mut rows = inner.rows.write();
        self.check_conflicts(&rows)?;

        let count = self.writes.len();
        for (row_id, value) in self.writes.drain(..) {
            let row = rows.entry(row_id).or_insert(VersionedRow {
                value: Value::Null,
                version: 0,
            });
            row.value = value;
            row.version += 1;
        }
        trace!(connection = %self.id, writes = count, "physical transaction committed");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.finished = true;
        trace!(connection = %self.id, discarded = self.writes.len(), "physical transaction rolled back");
        self.writes.clear();
        Ok(())
    }

    fn create_savepoint(&mut self, name: &str) -> StorageResult<()> {
        if !self.inner.config.savepoints {
            return Err(StorageError::SavepointsUnsupported);
        }
        self.savepoints.push((name.to_string(), self.writes.len()));
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> StorageResult<()> {
        let position = self.savepoint_position(name)?;
        let mark = self.savepoints[position].1;
        self.writes.truncate(mark);
        self.savepoints.truncate(position + 1);
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> StorageResult<()> {
        let position = self.savepoint_position(name)?;
        self.savepoints.truncate(position);
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.finished {
            debug!(connection = %self.id, "connection dropped with an open transaction, discarding work");
        }
        let mut in_use = self.inner.in_use.lock();
        *in_use = in_use.saturating_sub(1);
        self.inner.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> MemoryBackend {
        MemoryBackend::with_config(MemoryBackendConfig::default().acquire_timeout_ms(50))
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let backend = setup();
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        conn.put("accounts", "1", json!({"balance": "10"})).unwrap();

        // Not visible before commit
        assert!(backend.read_committed("accounts", "1").is_none());
        // Own writes are visible
        assert!(conn.get("accounts", "1").unwrap().is_some());

        conn.commit().unwrap();
        assert_eq!(
            backend.read_committed("accounts", "1"),
            Some(json!({"balance": "10"}))
        );
    }

    #[test]
    fn test_rollback_and_drop_discard_writes() {
        let backend = setup();
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        conn.put("accounts", "1", json!(1)).unwrap();
        conn.rollback().unwrap();

        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        conn.put("accounts", "2", json!(2)).unwrap();
        drop(conn);

        assert_eq!(backend.row_count(), 0);
        assert_eq!(backend.in_use(), 0);
    }

    #[test]
    fn test_savepoint_partial_rollback() {
        let backend = setup();
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        conn.put("t", "a", json!(1)).unwrap();
        conn.create_savepoint("SAVEPOINT_1").unwrap();
        conn.put("t", "b", json!(2)).unwrap();
        conn.put("t", "a", json!(3)).unwrap();

        conn.rollback_to_savepoint("SAVEPOINT_1").unwrap();
        assert_eq!(conn.get("t", "a").unwrap(), Some(json!(1)));
        assert_eq!(conn.get("t", "b").unwrap(), None);

        conn.release_savepoint("SAVEPOINT_1").unwrap();
        assert!(matches!(
            conn.rollback_to_savepoint("SAVEPOINT_1"),
            Err(StorageError::SavepointNotFound(_))
        ));
        conn.commit().unwrap();
        assert_eq!(backend.read_committed("t", "a"), Some(json!(1)));
    }

    #[test]
    fn test_savepoints_disabled() {
        let backend = MemoryBackend::with_config(MemoryBackendConfig::default().savepoints(false));
        assert!(!backend.supports_savepoints());
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        assert!(matches!(
            conn.create_savepoint("SAVEPOINT_1"),
            Err(StorageError::SavepointsUnsupported)
        ));
    }

    #[test]
    fn test_first_committer_wins() {
        let backend = setup();
        let mut conn1 = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        let mut conn2 = backend.connect(IsolationLevel::ReadCommitted).unwrap();

        assert!(conn1.get("t", "x").unwrap().is_none());
        assert!(conn2.get("t", "x").unwrap().is_none());
        conn1.put("t", "x", json!(1)).unwrap();
        conn2.put("t", "x", json!(2)).unwrap();

        conn1.commit().unwrap();
        let err = conn2.commit().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(backend.read_committed("t", "x"), Some(json!(1)));
    }

    fn seed(backend: &MemoryBackend, key: &str) {
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        conn.put("t", key, json!(0)).unwrap();
        conn.commit().unwrap();
    }

    #[test]
    fn test_serializable_conflicts_on_rows_only_read() {
        let backend = setup();
        seed(&backend, "x");

        let mut reader = backend.connect(IsolationLevel::Serializable).unwrap();
        assert_eq!(reader.get("t", "x").unwrap(), Some(json!(0)));

        let mut writer = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        writer.put("t", "x", json!(1)).unwrap();
        writer.commit().unwrap();

        reader.put("t", "y", json!(2)).unwrap();
        let err = reader.commit().unwrap_err();
        assert!(matches!(
            err,
            StorageError::WriteConflict { ref key, .. } if key == "x"
        ));
        assert!(backend.read_committed("t", "y").is_none());
    }

    #[test]
    fn test_read_committed_ignores_rows_only_read() {
        let backend = setup();
        seed(&backend, "x");

        let mut reader = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        assert_eq!(reader.get("t", "x").unwrap(), Some(json!(0)));

        let mut writer = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        writer.put("t", "x", json!(1)).unwrap();
        writer.commit().unwrap();

        reader.put("t", "y", json!(2)).unwrap();
        reader.commit().unwrap();
        assert_eq!(backend.read_committed("t", "y"), Some(json!(2)));
        assert_eq!(backend.read_committed("t", "x"), Some(json!(1)));
    }

    #[test]
    fn test_repeatable_read_uses_snapshot() {
        let backend = setup();
        let mut reader = backend.connect(IsolationLevel::RepeatableRead).unwrap();

        let mut writer = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        writer.put("t", "x", json!(1)).unwrap();
        writer.commit().unwrap();

        assert!(reader.get("t", "x").unwrap().is_none());

        let mut fresh = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        assert_eq!(fresh.get("t", "x").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let backend = setup();
        backend.inject_write_fault("t", "x");
        let mut conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        assert!(matches!(
            conn.put("t", "x", json!(1)),
            Err(StorageError::InjectedFault { .. })
        ));
        conn.put("t", "x", json!(1)).unwrap();
    }

    #[test]
    fn test_pool_exhaustion_and_release() {
        let backend = MemoryBackend::with_config(
            MemoryBackendConfig::default().pool_size(1).acquire_timeout_ms(20),
        );
        let conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
        assert_eq!(backend.in_use(), 1);

        let err = backend.connect(IsolationLevel::ReadCommitted).unwrap_err();
        assert!(matches!(err, StorageError::PoolExhausted { waited_ms: 20 }));

        drop(conn);
        assert!(backend.connect(IsolationLevel::ReadCommitted).is_ok());
    }

    #[test]
    fn test_unrepresentable_acquire_timeout_waits_for_release() {
        let backend = MemoryBackend::with_config(
            MemoryBackendConfig::default()
                .pool_size(1)
                .acquire_timeout_ms(u64::MAX),
        );
        let held = backend.connect(IsolationLevel::ReadCommitted).unwrap();

        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                drop(held);
            });
            let conn = backend.connect(IsolationLevel::ReadCommitted).unwrap();
            assert_eq!(backend.in_use(), 1);
            drop(conn);
        });
        assert_eq!(backend.in_use(), 0);
    }
}
