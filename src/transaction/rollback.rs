//! Failure classification and rollback rules.
//!
//! Every error that can escape a unit of work maps to a [`FailureKind`]: a
//! stable name plus a [`FailureClass`]. A [`RollbackRule`] decides from the
//! kind whether the unit of work rolls back.
//!
//! Default rule: fatal and unchecked failures roll back, checked failures
//! commit whatever was written so far. Checked kinds must be opted in with
//! [`RollbackRule::rollback_for`].

use std::fmt;
use std::sync::Arc;

/// Severity class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The physical transaction can no longer be trusted (storage faults).
    /// Always rolls back.
    Fatal,
    /// Programming or state errors. Roll back by default.
    Unchecked,
    /// Expected, recoverable business outcomes. Do not roll back by default.
    Checked,
}

/// The kind of failure a unit of work ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailureKind {
    name: &'static str,
    class: FailureClass,
}

impl FailureKind {
    pub const fn new(name: &'static str, class: FailureClass) -> Self {
        Self { name, class }
    }

    pub const fn fatal(name: &'static str) -> Self {
        Self::new(name, FailureClass::Fatal)
    }

    pub const fn unchecked(name: &'static str) -> Self {
        Self::new(name, FailureClass::Unchecked)
    }

    pub const fn checked(name: &'static str) -> Self {
        Self::new(name, FailureClass::Checked)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn class(&self) -> FailureClass {
        self.class
    }

    pub fn is_fatal(&self) -> bool {
        self.class == FailureClass::Fatal
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.class)
    }
}

/// Errors that can report the failure kind used for rollback decisions.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

type RollbackPredicate = dyn Fn(&FailureKind) -> bool + Send + Sync;

/// Decides whether a failure rolls the unit of work back.
///
/// Evaluation order: fatal kinds always roll back; a custom predicate, if
/// set, decides everything else; otherwise a name listed in `rollback_for`
/// rolls back, a name listed in `no_rollback_for` commits, and unlisted
/// kinds fall back to their class. A name present in both lists rolls back.
#[derive(Clone, Default)]
pub struct RollbackRule {
    rollback_for: Vec<&'static str>,
    no_rollback_for: Vec<&'static str>,
    predicate: Option<Arc<RollbackPredicate>>,
}

impl RollbackRule {
    /// The default rule: roll back on fatal and unchecked failures only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also roll back when a failure with this name occurs.
    pub fn rollback_for(mut self, name: &'static str) -> Self {
        self.rollback_for.push(name);
        self
    }

    /// Commit rather than roll back when a failure with this name occurs.
    pub fn no_rollback_for(mut self, name: &'static str) -> Self {
        self.no_rollback_for.push(name);
        self
    }

    /// Decide non-fatal failures with an arbitrary predicate. Takes
    /// precedence over the name lists, which are kept but no longer consulted.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FailureKind) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn should_rollback(&self, kind: &FailureKind) -> bool {
        if kind.is_fatal() {
            return true;
        }
        if let Some(predicate) = &self.predicate {
            return predicate(kind);
        }
        if self.rollback_for.contains(&kind.name) {
            return true;
        }
        if self.no_rollback_for.contains(&kind.name) {
            return false;
        }
        kind.class == FailureClass::Unchecked
    }
}

impl fmt::Debug for RollbackRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackRule")
            .field("rollback_for", &self.rollback_for)
            .field("no_rollback_for", &self.no_rollback_for)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}
