//! Transaction manager - coordinates all transaction operations.
//!
//! The TransactionManager is the main entry point for transactions.
//! It handles:
//! - Propagation: joining, suspending, nesting and creating transactions
//! - Completion: the commit/rollback decision and its physical effects
//! - Timeouts: forced rollback once a deadline has passed
//! - Tracking active physical transactions and statistics

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::storage::{ConnectionId, PhysicalConnection, StorageBackend, StorageResult};
use crate::transaction::chain::{Binding, Frame, TransactionChain};
use crate::transaction::context::{
    CompletionOutcome, ContextRole, RollbackOrigin, RollbackReason, TransactionContext,
    TransactionDefinition, TransactionHandle, TransactionStatus, TIMEOUT_DEFAULT,
};
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::isolation::IsolationLevel;
use crate::transaction::propagation::Propagation;
use crate::transaction::rollback::{Classify, FailureKind};
use crate::transaction::savepoint::{SavepointCoordinator, SavepointId};

/// Manager-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Timeout applied when a definition asks for [`TIMEOUT_DEFAULT`]; `-1` is unbounded.
    pub default_timeout_secs: i64,
    /// Reject participants whose requested isolation differs from the running transaction.
    pub validate_existing_transaction: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: TIMEOUT_DEFAULT,
            validate_existing_transaction: false,
        }
    }
}

impl ManagerConfig {
    pub fn default_timeout_secs(mut self, secs: i64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    pub fn validate_existing_transaction(mut self, value: bool) -> Self {
        self.validate_existing_transaction = value;
        self
    }
}

/// Metadata of an active physical transaction.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    /// Transaction ID of the owning context.
    pub tx_id: String,
    /// Chain the transaction belongs to.
    pub chain_id: String,
    pub connection: ConnectionId,
    pub isolation: IsolationLevel,
    pub started_at: DateTime<Utc>,
}

/// Counters over physical transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub timed_out: u64,
}

/// Transaction manager - coordinates all transaction operations.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
/// The per-chain state lives in [`TransactionChain`]s, one per caller.
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<TransactionManagerInner>,
}

pub(crate) struct TransactionManagerInner {
    backend: Arc<dyn StorageBackend>,
    config: ManagerConfig,
    savepoints: SavepointCoordinator,
    /// Active physical transactions tracked by ID.
    active: RwLock<HashMap<String, TransactionMetadata>>,
    stats: Mutex<TransactionStats>,
}

impl TransactionManager {
    /// Create a new transaction manager over the given backend.
    pub fn new<B: StorageBackend + 'static>(backend: B) -> Self {
        Self::with_config(backend, ManagerConfig::default())
    }

    pub fn with_config<B: StorageBackend + 'static>(backend: B, config: ManagerConfig) -> Self {
        let savepoints = SavepointCoordinator::new(&backend);
        Self {
            inner: Arc::new(TransactionManagerInner {
                backend: Arc::new(backend),
                config,
                savepoints,
                active: RwLock::new(HashMap::new()),
                stats: Mutex::new(TransactionStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Start a new, empty call chain.
    pub fn chain(&self) -> TransactionChain {
        TransactionChain::new(self.inner.clone())
    }

    // ==================== Propagation ====================

    /// Open a context on the chain according to the definition's propagation.
    pub fn begin(
        &self,
        chain: &mut TransactionChain,
        definition: &TransactionDefinition,
    ) -> TransactionResult<TransactionHandle> {
        self.check_chain(chain)?;
        let timeout_secs = self.resolve_timeout(definition.timeout())?;
        let existing = chain.current_owner();

        match (definition.propagation(), existing) {
            (Propagation::Never, Some(owner)) => {
                let owner_ctx = &chain.frames[owner].context;
                if owner_ctx.status != TransactionStatus::RolledBack {
                    return Err(TransactionError::UnexpectedActiveTransaction {
                        tx_id: owner_ctx.id.clone(),
                    });
                }
                Ok(self.push_detached(chain, definition, timeout_secs))
            }
            (Propagation::Never, None) | (Propagation::Supports, None) => {
                Ok(self.push_detached(chain, definition, timeout_secs))
            }
            (Propagation::NotSupported, existing) => {
                if let Some(owner) = existing {
                    debug!(chain = %chain.id, suspended = %chain.frames[owner].context.id, "suspending transaction");
                }
                Ok(self.push_detached(chain, definition, timeout_secs))
            }
            (Propagation::RequiresNew, existing) => {
                if let Some(owner) = existing {
                    debug!(chain = %chain.id, suspended = %chain.frames[owner].context.id, "suspending transaction");
                }
                self.push_new(chain, definition, timeout_secs)
            }
            (Propagation::Mandatory, None) => Err(TransactionError::NoActiveTransaction),
            (Propagation::Required, None) | (Propagation::Nested, None) => {
                self.push_new(chain, definition, timeout_secs)
            }
            (Propagation::Nested, Some(owner)) => {
                self.check_deadline(chain, owner)?;
                self.ensure_in_progress(chain, owner)?;
                self.push_nested(chain, owner, definition, timeout_secs)
            }
            (Propagation::Required, Some(owner))
            | (Propagation::Supports, Some(owner))
            | (Propagation::Mandatory, Some(owner)) => {
                self.check_deadline(chain, owner)?;
                self.ensure_in_progress(chain, owner)?;
                self.push_participant(chain, owner, definition, timeout_secs)
            }
        }
    }

    fn push_new(
        &self,
        chain: &mut TransactionChain,
        definition: &TransactionDefinition,
        timeout_secs: i64,
    ) -> TransactionResult<TransactionHandle> {
        let isolation = definition.isolation_level();
        let connection = self.inner.backend.connect(isolation)?;
        let deadline = deadline_after(timeout_secs);

        let tx_id = new_tx_id();
        let context = TransactionContext::new(
            tx_id.clone(),
            definition,
            isolation,
            timeout_secs,
            ContextRole::NewTransaction,
        );

        self.inner.active.write().insert(
            tx_id.clone(),
            TransactionMetadata {
                tx_id: tx_id.clone(),
                chain_id: chain.id.clone(),
                connection: connection.id(),
                isolation,
                started_at: context.started_at,
            },
        );
        self.inner.stats.lock().begun += 1;
        debug!(
            chain = %chain.id,
            tx_id = %tx_id,
            name = definition.name().unwrap_or(""),
            propagation = %definition.propagation(),
            %isolation,
            connection = %connection.id(),
            timeout_secs,
            "began new transaction"
        );

        chain.frames.push(Frame {
            context,
            binding: Binding::Owner {
                connection: Some(connection),
                deadline,
            },
        });
        Ok(TransactionHandle {
            tx_id,
            role: ContextRole::NewTransaction,
        })
    }

    fn push_participant(
        &self,
        chain: &mut TransactionChain,
        owner: usize,
        definition: &TransactionDefinition,
        timeout_secs: i64,
    ) -> TransactionResult<TransactionHandle> {
        let isolation = self.existing_isolation(chain, owner, definition)?;
        let tx_id = new_tx_id();
        debug!(
            chain = %chain.id,
            tx_id = %tx_id,
            joined = %chain.frames[owner].context.id,
            propagation = %definition.propagation(),
            "participating in existing transaction"
        );
        chain.frames.push(Frame {
            context: TransactionContext::new(
                tx_id.clone(),
                definition,
                isolation,
                timeout_secs,
                ContextRole::Participating,
            ),
            binding: Binding::Participant,
        });
        Ok(TransactionHandle {
            tx_id,
            role: ContextRole::Participating,
        })
    }

    fn push_nested(
        &self,
        chain: &mut TransactionChain,
        owner: usize,
        definition: &TransactionDefinition,
        timeout_secs: i64,
    ) -> TransactionResult<TransactionHandle> {
        let isolation = self.existing_isolation(chain, owner, definition)?;
        let savepoints = &self.inner.savepoints;
        if !savepoints.is_supported() {
            return Err(TransactionError::SavepointUnsupported {
                backend: self.inner.backend.name().to_string(),
            });
        }
        let connection = chain
            .connection_mut(owner)
            .ok_or_else(|| TransactionError::Internal("nested begin without a connection".into()))?;
        let savepoint = savepoints.create_savepoint(connection.as_mut())?;

        let tx_id = new_tx_id();
        debug!(chain = %chain.id, tx_id = %tx_id, %savepoint, "began nested transaction");
        chain.frames.push(Frame {
            context: TransactionContext::new(
                tx_id.clone(),
                definition,
                isolation,
                timeout_secs,
                ContextRole::Nested,
            ),
            binding: Binding::Nested { savepoint },
        });
        Ok(TransactionHandle {
            tx_id,
            role: ContextRole::Nested,
        })
    }

    fn push_detached(
        &self,
        chain: &mut TransactionChain,
        definition: &TransactionDefinition,
        timeout_secs: i64,
    ) -> TransactionHandle {
        let tx_id = new_tx_id();
        debug!(
            chain = %chain.id,
            tx_id = %tx_id,
            propagation = %definition.propagation(),
            "running without transaction"
        );
        chain.frames.push(Frame {
            context: TransactionContext::new(
                tx_id.clone(),
                definition,
                definition.isolation_level(),
                timeout_secs,
                ContextRole::NonTransactional,
            ),
            binding: Binding::Detached,
        });
        TransactionHandle {
            tx_id,
            role: ContextRole::NonTransactional,
        }
    }

    /// Isolation a joining context gets: always the running transaction's.
    fn existing_isolation(
        &self,
        chain: &TransactionChain,
        owner: usize,
        definition: &TransactionDefinition,
    ) -> TransactionResult<IsolationLevel> {
        let existing = chain.frames[owner].context.isolation;
        let requested = definition.isolation_level();
        if requested != existing {
            if self.inner.config.validate_existing_transaction {
                return Err(TransactionError::IncompatibleIsolation {
                    requested,
                    existing,
                });
            }
            debug!(%requested, %existing, "participant isolation ignored");
        }
        Ok(existing)
    }

    fn ensure_in_progress(&self, chain: &TransactionChain, owner: usize) -> TransactionResult<()> {
        let ctx = &chain.frames[owner].context;
        if ctx.status == TransactionStatus::RolledBack {
            return Err(TransactionError::Timeout {
                tx_id: ctx.id.clone(),
                timeout_secs: ctx.timeout_secs,
            });
        }
        Ok(())
    }

    fn resolve_timeout(&self, requested: i64) -> TransactionResult<i64> {
        match requested {
            TIMEOUT_DEFAULT => Ok(self.inner.config.default_timeout_secs.max(TIMEOUT_DEFAULT)),
            secs if secs >= 0 => Ok(secs),
            secs => Err(TransactionError::InvalidTimeout(secs)),
        }
    }

    // ==================== Completion ====================

    /// Mark a context rollback-only. Idempotent; a marked context never unmarks.
    pub fn mark_rollback_only(
        &self,
        chain: &mut TransactionChain,
        handle: &TransactionHandle,
    ) -> TransactionResult<()> {
        self.check_chain(chain)?;
        let index = chain
            .position(&handle.tx_id)
            .ok_or_else(|| TransactionError::UnknownContext(handle.tx_id.clone()))?;
        chain.frames[index]
            .context
            .mark_rollback_only(RollbackOrigin::Explicit);
        Ok(())
    }

    /// Complete the innermost context, committing or rolling back.
    ///
    /// Rolls back when the context is rollback-only, or when `failure` is
    /// present and the context's rollback rule asks for it. Commits otherwise.
    pub fn complete(
        &self,
        chain: &mut TransactionChain,
        handle: &TransactionHandle,
        failure: Option<&FailureKind>,
    ) -> TransactionResult<CompletionOutcome> {
        self.check_chain(chain)?;
        let innermost = match chain.frames.last() {
            Some(frame) => frame.context.id.clone(),
            None => return Err(TransactionError::UnknownContext(handle.tx_id.clone())),
        };
        if innermost != handle.tx_id {
            return Err(match chain.position(&handle.tx_id) {
                Some(_) => TransactionError::OutOfOrderCompletion {
                    tx_id: handle.tx_id.clone(),
                    innermost,
                },
                None => TransactionError::UnknownContext(handle.tx_id.clone()),
            });
        }
        let Some(Frame { context, binding }) = chain.frames.pop() else {
            return Err(TransactionError::UnknownContext(handle.tx_id.clone()));
        };

        let outcome = match binding {
            Binding::Owner {
                connection,
                deadline,
            } => self.complete_owner(&context, connection, deadline, failure),
            Binding::Participant => Ok(self.complete_participant(chain, &context, failure)),
            Binding::Nested { savepoint } => {
                self.complete_nested(chain, &context, &savepoint, failure)
            }
            Binding::Detached => Ok(match rollback_reason(&context, failure) {
                Some(reason) => CompletionOutcome::RolledBack { reason },
                None => CompletionOutcome::Committed,
            }),
        };

        if matches!(context.role, ContextRole::NewTransaction | ContextRole::NonTransactional) {
            if let Some(owner) = chain.current_owner() {
                debug!(chain = %chain.id, resumed = %chain.frames[owner].context.id, "resuming suspended transaction");
            }
        }
        outcome
    }

    fn complete_owner(
        &self,
        context: &TransactionContext,
        connection: Option<Box<dyn PhysicalConnection>>,
        deadline: Option<Instant>,
        failure: Option<&FailureKind>,
    ) -> TransactionResult<CompletionOutcome> {
        self.inner.active.write().remove(&context.id);

        // Already force-rolled back by a timeout
        let Some(connection) = connection else {
            return Ok(CompletionOutcome::RolledBack {
                reason: RollbackReason::Timeout,
            });
        };

        let reason = rollback_reason(context, failure);
        if reason.is_none() && deadline.is_some_and(|d| Instant::now() >= d) {
            self.physical_rollback(&context.id, connection);
            self.inner.stats.lock().timed_out += 1;
            warn!(tx_id = %context.id, timeout_secs = context.timeout_secs, "transaction deadline passed before commit, rolled back");
            return Err(TransactionError::Timeout {
                tx_id: context.id.clone(),
                timeout_secs: context.timeout_secs,
            });
        }

        match reason {
            None => {
                if let Err(e) = connection.commit() {
                    self.inner.stats.lock().rolled_back += 1;
                    warn!(tx_id = %context.id, error = %e, "commit failed, transaction rolled back");
                    return Err(e.into());
                }
                self.inner.stats.lock().committed += 1;
                debug!(tx_id = %context.id, "transaction committed");
                Ok(CompletionOutcome::Committed)
            }
            Some(reason) => {
                self.physical_rollback(&context.id, connection);
                debug!(tx_id = %context.id, ?reason, "transaction rolled back");
                Ok(CompletionOutcome::RolledBack { reason })
            }
        }
    }

    fn complete_participant(
        &self,
        chain: &mut TransactionChain,
        context: &TransactionContext,
        failure: Option<&FailureKind>,
    ) -> CompletionOutcome {
        match rollback_reason(context, failure) {
            None => CompletionOutcome::Committed,
            Some(reason) => {
                // The popped participant sat directly on top of its unit
                let top = chain.frames.len() - 1;
                let unit = chain.unit_range(top);
                debug!(tx_id = %context.id, ?reason, "participant failed, marking enclosing transaction rollback-only");
                chain.mark_range(unit, RollbackOrigin::Participant);
                CompletionOutcome::RolledBack { reason }
            }
        }
    }

    fn complete_nested(
        &self,
        chain: &mut TransactionChain,
        context: &TransactionContext,
        savepoint: &SavepointId,
        failure: Option<&FailureKind>,
    ) -> TransactionResult<CompletionOutcome> {
        let Some(owner) = chain.current_owner() else {
            return Err(TransactionError::Internal(
                "nested transaction without an enclosing owner".into(),
            ));
        };
        let reason = rollback_reason(context, failure);
        if reason.is_none() {
            self.check_deadline(chain, owner)?;
        }

        let Some(connection) = chain.connection_mut(owner) else {
            return Ok(CompletionOutcome::RolledBack {
                reason: RollbackReason::Timeout,
            });
        };
        let savepoints = &self.inner.savepoints;
        match reason {
            None => {
                savepoints.release_savepoint(connection.as_mut(), savepoint)?;
                Ok(CompletionOutcome::Committed)
            }
            Some(reason) => {
                savepoints.rollback_to_savepoint(connection.as_mut(), savepoint)?;
                debug!(tx_id = %context.id, ?reason, "nested transaction rolled back");
                Ok(CompletionOutcome::RolledBack { reason })
            }
        }
    }

    fn physical_rollback(&self, tx_id: &str, connection: Box<dyn PhysicalConnection>) {
        if let Err(e) = connection.rollback() {
            warn!(tx_id, error = %e, "physical rollback failed, connection discarded");
        }
        self.inner.stats.lock().rolled_back += 1;
    }

    // ==================== Storage Access ====================

    /// Run a storage operation on the physical transaction bound to the chain.
    ///
    /// Without a bound transaction the operation runs on its own short
    /// auto-commit connection. A storage failure inside a transaction marks
    /// every context sharing it rollback-only.
    pub fn with_connection<F, T>(&self, chain: &mut TransactionChain, f: F) -> TransactionResult<T>
    where
        F: FnOnce(&mut dyn PhysicalConnection) -> StorageResult<T>,
    {
        self.check_chain(chain)?;
        let Some(owner) = chain.current_owner() else {
            let isolation = chain.current().map(|c| c.isolation).unwrap_or_default();
            return self.auto_commit(isolation, f);
        };

        self.check_deadline(chain, owner)?;
        let Some(connection) = chain.connection_mut(owner) else {
            return Err(self.timeout_error(chain, owner));
        };
        match f(connection.as_mut()) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(chain = %chain.id, tx_id = %chain.frames[owner].context.id, error = %e, "storage failure, transaction marked rollback-only");
                let range = chain.physical_range(owner);
                chain.mark_range(range, RollbackOrigin::StorageFailure);
                Err(e.into())
            }
        }
    }

    fn auto_commit<F, T>(&self, isolation: IsolationLevel, f: F) -> TransactionResult<T>
    where
        F: FnOnce(&mut dyn PhysicalConnection) -> StorageResult<T>,
    {
        let mut connection = self.inner.backend.connect(isolation)?;
        match f(connection.as_mut()) {
            Ok(value) => {
                connection.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = connection.rollback() {
                    warn!(error = %rollback, "auto-commit rollback failed");
                }
                Err(e.into())
            }
        }
    }

    /// Force-roll back the transaction owned by `owner` if its deadline passed.
    fn check_deadline(&self, chain: &mut TransactionChain, owner: usize) -> TransactionResult<()> {
        let expired = match &chain.frames[owner].binding {
            Binding::Owner {
                connection: Some(_),
                deadline: Some(deadline),
            } => Instant::now() >= *deadline,
            _ => false,
        };
        if !expired {
            return Ok(());
        }

        let range = chain.physical_range(owner);
        for frame in &mut chain.frames[range] {
            frame.context.status = TransactionStatus::RolledBack;
        }
        let tx_id = chain.frames[owner].context.id.clone();
        if let Binding::Owner { connection, .. } = &mut chain.frames[owner].binding {
            if let Some(connection) = connection.take() {
                self.physical_rollback(&tx_id, connection);
            }
        }
        self.inner.active.write().remove(&tx_id);
        self.inner.stats.lock().timed_out += 1;
        warn!(chain = %chain.id, tx_id = %tx_id, "transaction timed out, rolled back");
        Err(self.timeout_error(chain, owner))
    }

    fn timeout_error(&self, chain: &TransactionChain, owner: usize) -> TransactionError {
        let ctx = &chain.frames[owner].context;
        TransactionError::Timeout {
            tx_id: ctx.id.clone(),
            timeout_secs: ctx.timeout_secs,
        }
    }

    // ==================== Scoped Execution ====================

    /// Execute a closure within a context, completing it from the closure's result.
    ///
    /// On `Err` the context completes with the error's failure kind and the
    /// error is returned. If the closure succeeded but its new transaction was
    /// rolled back anyway (a participant failed, storage failed, or the
    /// deadline passed), the caller gets [`TransactionError::UnexpectedRollback`].
    pub fn execute<F, T, E>(
        &self,
        chain: &mut TransactionChain,
        definition: &TransactionDefinition,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionChain) -> Result<T, E>,
        E: From<TransactionError> + Classify,
    {
        let handle = self.begin(chain, definition)?;

        match body(chain) {
            Ok(value) => match self.complete(chain, &handle, None)? {
                CompletionOutcome::Committed => Ok(value),
                CompletionOutcome::RolledBack {
                    reason: RollbackReason::RollbackOnly(RollbackOrigin::Explicit),
                } => Ok(value),
                CompletionOutcome::RolledBack { .. }
                    if handle.role == ContextRole::NewTransaction =>
                {
                    Err(TransactionError::UnexpectedRollback {
                        tx_id: handle.tx_id,
                    }
                    .into())
                }
                CompletionOutcome::RolledBack { .. } => Ok(value),
            },
            Err(err) => {
                let kind = err.failure_kind();
                if let Err(completion) = self.complete(chain, &handle, Some(&kind)) {
                    warn!(tx_id = %handle.tx_id, error = %completion, "completion after failure did not succeed");
                }
                Err(err)
            }
        }
    }

    // ==================== Introspection ====================

    /// Get the number of active physical transactions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// List all active transaction IDs.
    pub fn active_transactions(&self) -> Vec<String> {
        self.inner.active.read().keys().cloned().collect()
    }

    /// Check if a transaction is active.
    pub fn is_active(&self, tx_id: &str) -> bool {
        self.inner.active.read().contains_key(tx_id)
    }

    /// Get metadata for an active transaction.
    pub fn get_transaction_info(&self, tx_id: &str) -> Option<TransactionMetadata> {
        self.inner.active.read().get(tx_id).cloned()
    }

    pub fn stats(&self) -> TransactionStats {
        *self.inner.stats.lock()
    }

    fn check_chain(&self, chain: &TransactionChain) -> TransactionResult<()> {
        if Arc::ptr_eq(&chain.manager, &self.inner) {
            Ok(())
        } else {
            Err(TransactionError::ForeignChain(chain.id.clone()))
        }
    }
}

impl TransactionManagerInner {
    /// Roll back whatever a dropped chain left open.
    pub(crate) fn abandon(&self, chain_id: &str, frames: Vec<Frame>) {
        for frame in frames.into_iter().rev() {
            if let Binding::Owner {
                connection: Some(connection),
                ..
            } = frame.binding
            {
                warn!(chain = chain_id, tx_id = %frame.context.id, "chain dropped with open transaction, rolling back");
                if let Err(e) = connection.rollback() {
                    warn!(tx_id = %frame.context.id, error = %e, "physical rollback failed");
                }
                self.active.write().remove(&frame.context.id);
                self.stats.lock().rolled_back += 1;
            }
        }
    }
}

fn rollback_reason(
    context: &TransactionContext,
    failure: Option<&FailureKind>,
) -> Option<RollbackReason> {
    // Force-rolled back when its physical transaction timed out
    if context.status == TransactionStatus::RolledBack {
        return Some(RollbackReason::Timeout);
    }
    if context.status == TransactionStatus::MarkedRollbackOnly {
        return Some(RollbackReason::RollbackOnly(
            context.rollback_origin.unwrap_or(RollbackOrigin::Explicit),
        ));
    }
    match failure {
        Some(kind) if context.should_rollback(kind) => Some(RollbackReason::Failure(*kind)),
        _ => None,
    }
}

/// Deadline for a timeout in seconds; `None` when unbounded or past what
/// `Instant` can represent.
fn deadline_after(timeout_secs: i64) -> Option<Instant> {
    let secs = u64::try_from(timeout_secs).ok()?;
    Instant::now().checked_add(Duration::from_secs(secs))
}

fn new_tx_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

// Ensure TransactionManager can be safely shared across threads
impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("backend", &self.inner.backend.name())
            .field("active_count", &self.active_count())
            .finish()
    }
}
