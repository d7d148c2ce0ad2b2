//! Transaction definitions, contexts and completion outcomes.
//!
//! A [`TransactionDefinition`] is the per-call-site configuration handed to
//! `begin`. The manager turns it into a [`TransactionContext`] on the chain
//! and gives the caller a [`TransactionHandle`] to complete it with.

use chrono::{DateTime, Utc};

use crate::transaction::isolation::IsolationLevel;
use crate::transaction::propagation::Propagation;
use crate::transaction::rollback::{FailureKind, RollbackRule};

/// Timeout value meaning "use the manager's default".
pub const TIMEOUT_DEFAULT: i64 = -1;

/// Configuration for one unit of work.
#[derive(Debug, Clone)]
pub struct TransactionDefinition {
    name: Option<String>,
    propagation: Propagation,
    isolation: IsolationLevel,
    timeout_secs: i64,
    rollback_rule: RollbackRule,
}

impl Default for TransactionDefinition {
    fn default() -> Self {
        Self {
            name: None,
            propagation: Propagation::default(),
            isolation: IsolationLevel::default(),
            timeout_secs: TIMEOUT_DEFAULT,
            rollback_rule: RollbackRule::default(),
        }
    }
}

impl TransactionDefinition {
    /// A definition with the given propagation and defaults for everything else.
    pub fn new(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Default::default()
        }
    }

    /// Label used in log output.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Timeout in seconds; [`TIMEOUT_DEFAULT`] defers to the manager.
    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.rollback_rule = rule;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn timeout(&self) -> i64 {
        self.timeout_secs
    }

    pub fn rule(&self) -> &RollbackRule {
        &self.rollback_rule
    }
}

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    MarkedRollbackOnly,
    Committed,
    RolledBack,
}

/// How a context relates to the physical transaction underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    /// Owns a physical transaction on its own connection.
    NewTransaction,
    /// Joined a physical transaction owned by an outer context.
    Participating,
    /// Runs inside a savepoint of the outer physical transaction.
    Nested,
    /// No physical transaction; each operation auto-commits.
    NonTransactional,
}

/// Who marked a context rollback-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOrigin {
    /// `mark_rollback_only` on the context itself.
    Explicit,
    /// A participating context of the same unit rolled back.
    Participant,
    /// A storage operation on the physical transaction failed.
    StorageFailure,
}

/// Why a context rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackReason {
    /// The unit of work failed and the rollback rule asked for a rollback.
    Failure(FailureKind),
    /// The context was marked rollback-only.
    RollbackOnly(RollbackOrigin),
    /// The transaction deadline passed.
    Timeout,
}

/// Result of completing a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Committed,
    RolledBack { reason: RollbackReason },
}

impl CompletionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CompletionOutcome::Committed)
    }
}

/// One logical unit of work on a chain.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub(crate) id: String,
    pub(crate) name: Option<String>,
    pub(crate) propagation: Propagation,
    pub(crate) isolation: IsolationLevel,
    pub(crate) timeout_secs: i64,
    pub(crate) rollback_rule: RollbackRule,
    pub(crate) status: TransactionStatus,
    pub(crate) role: ContextRole,
    pub(crate) rollback_origin: Option<RollbackOrigin>,
    pub(crate) started_at: DateTime<Utc>,
}

impl TransactionContext {
    pub(crate) fn new(
        id: String,
        definition: &TransactionDefinition,
        isolation: IsolationLevel,
        timeout_secs: i64,
        role: ContextRole,
    ) -> Self {
        Self {
            id,
            name: definition.name.clone(),
            propagation: definition.propagation,
            isolation,
            timeout_secs,
            rollback_rule: definition.rollback_rule.clone(),
            status: TransactionStatus::Active,
            role,
            rollback_origin: None,
            started_at: Utc::now(),
        }
    }

    /// Get the transaction ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Isolation level of the physical transaction this context runs in.
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Effective timeout in seconds, `-1` when unbounded.
    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    pub fn rollback_origin(&self) -> Option<RollbackOrigin> {
        self.rollback_origin
    }

    /// When the context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_new_transaction(&self) -> bool {
        self.role == ContextRole::NewTransaction
    }

    pub fn is_nested(&self) -> bool {
        self.role == ContextRole::Nested
    }

    /// Whether work in this context runs inside a physical transaction.
    pub fn is_transactional(&self) -> bool {
        self.role != ContextRole::NonTransactional
    }

    pub fn is_rollback_only(&self) -> bool {
        self.status == TransactionStatus::MarkedRollbackOnly
    }

    /// Evaluate the context's rollback rule for a failure.
    pub fn should_rollback(&self, kind: &FailureKind) -> bool {
        self.rollback_rule.should_rollback(kind)
    }

    /// Mark rollback-only. Never unmarks, and leaves completed contexts alone.
    pub(crate) fn mark_rollback_only(&mut self, origin: RollbackOrigin) {
        if self.status == TransactionStatus::Active {
            self.status = TransactionStatus::MarkedRollbackOnly;
            self.rollback_origin = Some(origin);
        }
    }
}

/// Caller-side reference to a context opened by `begin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    pub(crate) tx_id: String,
    pub(crate) role: ContextRole,
}

impl TransactionHandle {
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(definition: &TransactionDefinition) -> TransactionContext {
        TransactionContext::new(
            "tx001".to_string(),
            definition,
            definition.isolation_level(),
            definition.timeout(),
            ContextRole::NewTransaction,
        )
    }

    #[test]
    fn test_definition_defaults() {
        let definition = TransactionDefinition::default();
        assert_eq!(definition.propagation(), Propagation::Required);
        assert_eq!(definition.isolation_level(), IsolationLevel::ReadCommitted);
        assert_eq!(definition.timeout(), TIMEOUT_DEFAULT);
        assert!(definition.name().is_none());
    }

    #[test]
    fn test_should_rollback_uses_rule() {
        let kind = FailureKind::checked("InsufficientFunds");
        let ctx = context(&TransactionDefinition::default());
        assert!(!ctx.should_rollback(&kind));

        let definition = TransactionDefinition::default()
            .rollback_rule(RollbackRule::new().rollback_for("InsufficientFunds"));
        assert!(context(&definition).should_rollback(&kind));
    }

    #[test]
    fn test_mark_rollback_only_is_monotonic() {
        let mut ctx = context(&TransactionDefinition::default().named("transfer"));
        ctx.mark_rollback_only(RollbackOrigin::Participant);
        ctx.mark_rollback_only(RollbackOrigin::Explicit);
        assert!(ctx.is_rollback_only());
        assert_eq!(ctx.rollback_origin(), Some(RollbackOrigin::Participant));

        ctx.status = TransactionStatus::RolledBack;
        ctx.mark_rollback_only(RollbackOrigin::Explicit);
        assert_eq!(ctx.status(), TransactionStatus::RolledBack);
    }
}
