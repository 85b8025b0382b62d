//! Admission gate shared by every fetch in a run.
//!
//! The limiter only bounds how many fetches execute at once. Shutdown
//! sequencing uses the separate [`WorkCounter`], which the dispatcher composes
//! with the limiter explicitly.

mod outstanding;

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

pub use outstanding::{WorkCounter, WorkGuard};

#[derive(Debug)]
struct Slots {
    capacity: usize,
    occupied: usize,
}

/// Resizable counting gate. `occupied` never exceeds `capacity` for slots
/// handed out after the last resize; shrinking never evicts running fetches.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    slots: Mutex<Slots>,
    freed: Notify,
}

impl ConcurrencyLimiter {
    /// Create a gate with `capacity` slots (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                capacity: capacity.max(1),
                occupied: 0,
            }),
            freed: Notify::new(),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.slots().capacity
    }

    /// Slots currently held.
    pub fn occupied(&self) -> usize {
        self.slots().occupied
    }

    /// Wait until a slot is free and take it. The slot is released when the
    /// returned permit is dropped. Cancel-safe: dropping the future holds nothing.
    pub async fn acquire(self: &Arc<Self>) -> SlotPermit {
        loop {
            let freed = self.freed.notified();
            tokio::pin!(freed);
            // Register before checking so a release between check and await is not lost.
            freed.as_mut().enable();
            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            freed.await;
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotPermit> {
        let mut slots = self.slots();
        if slots.occupied >= slots.capacity {
            return None;
        }
        slots.occupied += 1;
        Some(SlotPermit {
            limiter: Arc::clone(self),
        })
    }

    /// Resize the gate and return the previous capacity. Running fetches keep
    /// their slots; if the gate shrank below `occupied`, new admissions wait
    /// until enough of them finish.
    pub fn set_capacity(&self, capacity: usize) -> usize {
        self.update(|_| capacity).0
    }

    /// Compute the new capacity from the current one under a single lock, so
    /// concurrent resizes compose. Returns `(previous, new)`; the new value is
    /// clamped to at least 1.
    pub fn update(&self, f: impl FnOnce(usize) -> usize) -> (usize, usize) {
        let resized = {
            let mut slots = self.slots();
            let previous = slots.capacity;
            slots.capacity = f(previous).max(1);
            (previous, slots.capacity)
        };
        self.freed.notify_waiters();
        resized
    }

    fn release(&self) {
        {
            let mut slots = self.slots();
            slots.occupied = slots.occupied.saturating_sub(1);
        }
        self.freed.notify_waiters();
    }
}

/// One occupied slot. Releases on drop, including on panic and early return.
#[derive(Debug)]
pub struct SlotPermit {
    limiter: Arc<ConcurrencyLimiter>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
