//! Live pipeline counters.
//!
//! Written by the dispatcher, its tasks and the sink; read by the reporter
//! with plain atomic loads so reporting never blocks the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one run.
#[derive(Debug, Default)]
pub struct PipelineStats {
    admitted: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`] plus limiter occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub capacity: usize,
    pub occupied: usize,
    /// Identifiers read from the source (requeues not included).
    pub admitted: u64,
    /// Records written by the sink.
    pub completed: u64,
    /// Failed attempts that were retried or requeued.
    pub retried: u64,
    /// Attempts that hit the throttling filter.
    pub rate_limited: u64,
    /// Identifiers abandoned (retry budget exhausted or run cancelled).
    pub failed: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    /// Snapshot counters; `capacity`/`occupied` come from the limiter.
    pub fn snapshot(&self, capacity: usize, occupied: usize) -> StatsSnapshot {
        StatsSnapshot {
            capacity,
            occupied,
            admitted: self.admitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_records() {
        let stats = PipelineStats::new();
        stats.record_admitted();
        stats.record_admitted();
        stats.record_completed();
        stats.record_retry();
        stats.record_rate_limited();
        stats.record_failed();
        let s = stats.snapshot(3, 1);
        assert_eq!(
            s,
            StatsSnapshot {
                capacity: 3,
                occupied: 1,
                admitted: 2,
                completed: 1,
                retried: 1,
                rate_limited: 1,
                failed: 1,
            }
        );
    }
}
