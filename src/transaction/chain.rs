//! Per-call-chain transaction state.
//!
//! A [`TransactionChain`] is the explicit handle a caller threads through
//! every transactional call. It holds the stack of open contexts, innermost
//! last, together with the physical connections they own. Chains are never
//! shared: each thread or task creates its own from the manager.
//!
//! The usable connection is the one owned by the nearest owner frame below
//! the top of the stack. A detached (non-transactional) frame above an owner
//! hides it, and so does a newer owner, which is how suspension works: the
//! hidden connection stays parked in its frame until the frames above it
//! complete.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

use ulid::Ulid;

use crate::storage::PhysicalConnection;
use crate::transaction::context::{RollbackOrigin, TransactionContext, TransactionHandle};
use crate::transaction::manager::TransactionManagerInner;
use crate::transaction::savepoint::SavepointId;

/// How a frame is bound to physical storage.
pub(crate) enum Binding {
    /// Owns a physical transaction. The connection is gone once the
    /// transaction has been force-rolled back by a timeout.
    Owner {
        connection: Option<Box<dyn PhysicalConnection>>,
        deadline: Option<Instant>,
    },
    /// Shares the physical transaction of the owner below.
    Participant,
    /// Shares the physical transaction of the owner below, behind a savepoint.
    Nested { savepoint: SavepointId },
    /// No physical transaction.
    Detached,
}

pub(crate) struct Frame {
    pub(crate) context: TransactionContext,
    pub(crate) binding: Binding,
}

/// The transaction state of one logical call chain.
pub struct TransactionChain {
    pub(crate) id: String,
    pub(crate) frames: Vec<Frame>,
    pub(crate) manager: Arc<TransactionManagerInner>,
}

impl TransactionChain {
    pub(crate) fn new(manager: Arc<TransactionManagerInner>) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            frames: Vec::new(),
            manager,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of open contexts.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost open context.
    pub fn current(&self) -> Option<&TransactionContext> {
        self.frames.last().map(|frame| &frame.context)
    }

    /// Look up an open context by handle.
    pub fn context(&self, handle: &TransactionHandle) -> Option<&TransactionContext> {
        self.position(&handle.tx_id)
            .map(|index| &self.frames[index].context)
    }

    /// Whether work issued now would run inside a physical transaction.
    pub fn has_transaction(&self) -> bool {
        self.current_owner().is_some()
    }

    /// Number of physical transactions parked below the usable one.
    pub fn suspended_count(&self) -> usize {
        let current = self.current_owner();
        self.frames
            .iter()
            .enumerate()
            .filter(|(index, frame)| {
                Some(*index) != current
                    && matches!(
                        frame.binding,
                        Binding::Owner {
                            connection: Some(_),
                            ..
                        }
                    )
            })
            .count()
    }

    pub(crate) fn position(&self, tx_id: &str) -> Option<usize> {
        self.frames
            .iter()
            .rposition(|frame| frame.context.id == tx_id)
    }

    /// Index of the owner frame whose transaction `index` runs in.
    pub(crate) fn owner_of(&self, index: usize) -> Option<usize> {
        for i in (0..=index).rev() {
            match self.frames[i].binding {
                Binding::Owner { .. } => return Some(i),
                Binding::Detached => return None,
                Binding::Participant | Binding::Nested { .. } => {}
            }
        }
        None
    }

    /// Owner of the transaction new work would run in.
    pub(crate) fn current_owner(&self) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        self.owner_of(self.frames.len() - 1)
    }

    /// Frames that share the physical transaction owned by `owner`.
    pub(crate) fn physical_range(&self, owner: usize) -> RangeInclusive<usize> {
        let mut end = owner;
        while end + 1 < self.frames.len()
            && matches!(
                self.frames[end + 1].binding,
                Binding::Participant | Binding::Nested { .. }
            )
        {
            end += 1;
        }
        owner..=end
    }

    /// Frames forming the unit of work `index` belongs to: everything down to
    /// and including the nearest owner or nested frame.
    pub(crate) fn unit_range(&self, index: usize) -> RangeInclusive<usize> {
        let mut start = index;
        while start > 0 && matches!(self.frames[start].binding, Binding::Participant) {
            start -= 1;
        }
        start..=index
    }

    pub(crate) fn mark_range(&mut self, range: RangeInclusive<usize>, origin: RollbackOrigin) {
        for frame in &mut self.frames[range] {
            frame.context.mark_rollback_only(origin);
        }
    }

    pub(crate) fn connection_mut(
        &mut self,
        owner: usize,
    ) -> Option<&mut Box<dyn PhysicalConnection>> {
        match &mut self.frames[owner].binding {
            Binding::Owner { connection, .. } => connection.as_mut(),
            _ => None,
        }
    }
}

impl Drop for TransactionChain {
    fn drop(&mut self) {
        if !self.frames.is_empty() {
            let frames = std::mem::take(&mut self.frames);
            self.manager.abandon(&self.id, frames);
        }
    }
}

impl std::fmt::Debug for TransactionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionChain")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("suspended", &self.suspended_count())
            .finish()
    }
}
