//! Pending-execution set
//!
//! Order ids inside an in-flight transaction. Marks are taken through a
//! [`PendingGuard`], which releases them on drop unless the submission was
//! committed.
//!
//! Created: 2026-10-18

use crate::types::OrderId;
use dashmap::DashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PendingExecution {
    ids: Arc<DashSet<OrderId>>,
}

impl PendingExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, id: &OrderId) -> bool {
        self.ids.contains(id)
    }

    /// Mark `ids` pending. Ids already pending are skipped and not owned by the guard.
    pub fn mark(&self, ids: &[OrderId]) -> PendingGuard {
        let owned = ids.iter().copied().filter(|id| self.ids.insert(*id)).collect();
        PendingGuard {
            set: self.clone(),
            ids: owned,
            committed: false,
        }
    }

    pub fn release(&self, ids: &[OrderId]) {
        for id in ids {
            self.ids.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Rolls its marks back on drop unless [`PendingGuard::commit`] was called.
#[derive(Debug)]
#[must_use = "dropping the guard releases the pending marks"]
pub struct PendingGuard {
    set: PendingExecution,
    ids: Vec<OrderId>,
    committed: bool,
}

impl PendingGuard {
    pub fn ids(&self) -> &[OrderId] {
        &self.ids
    }

    /// Keep the marks; the caller becomes responsible for releasing them.
    pub fn commit(mut self) -> Vec<OrderId> {
        self.committed = true;
        std::mem::take(&mut self.ids)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.committed {
            self.set.release(&self.ids);
        }
    }
}
