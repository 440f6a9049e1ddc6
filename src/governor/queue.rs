//! Bounded FIFO admission for upstream executions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dracin_common::{Error, Result};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Calls waiting for an execution slot.
    pub pending: usize,
    /// Calls holding an execution slot.
    pub active: usize,
    pub max_concurrent: usize,
    pub max_queue: usize,
}

/// At most `max_concurrent` holders at once; at most `max_queue` waiters.
///
/// Waiters are admitted in arrival order. A caller arriving when the waiting
/// line is full is rejected immediately with [`Error::QueueOverflow`].
pub struct RequestQueue {
    slots: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    max_concurrent: usize,
    max_queue: usize,
}

/// An execution slot. Released on drop.
#[derive(Debug)]
pub struct QueueSlot {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiting count even if the waiter is cancelled.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestQueue {
    pub fn new(max_concurrent: usize, max_queue: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            pending: Arc::new(AtomicUsize::new(0)),
            max_concurrent,
            max_queue,
        }
    }

    /// Wait for an execution slot.
    pub async fn enter(&self) -> Result<QueueSlot> {
        // Free slot and nobody waiting ahead of us.
        if let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() {
            return Ok(QueueSlot { _permit: permit });
        }

        let max_queue = self.max_queue;
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending < max_queue).then_some(pending + 1)
            })
            .map_err(|depth| Error::QueueOverflow { depth })?;
        let _guard = PendingGuard(Arc::clone(&self.pending));

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| Error::internal("request queue closed"))?;
        Ok(QueueSlot { _permit: permit })
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending.load(Ordering::SeqCst),
            active: self.max_concurrent - self.slots.available_permits(),
            max_concurrent: self.max_concurrent,
            max_queue: self.max_queue,
        }
    }
}
