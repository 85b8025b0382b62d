//! Outstanding-work counter used to sequence shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Counts admitted work that has not finished yet, including delayed requeues
/// that are waiting to be admitted again.
#[derive(Debug, Default)]
pub struct WorkCounter {
    count: AtomicUsize,
    idle: Notify,
}

impl WorkCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work; it stays outstanding until the guard drops.
    pub fn enter(self: &Arc<Self>) -> WorkGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        WorkGuard {
            counter: Arc::clone(self),
        }
    }

    /// Number of outstanding units.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolves once the count is zero. Returns immediately if it already is.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Keeps one unit outstanding. Moved along with the work (into the fetch
/// task, then into the requeue queue) so the count only drops when the
/// identifier is done for good.
#[derive(Debug)]
pub struct WorkGuard {
    counter: Arc<WorkCounter>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.counter.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}
