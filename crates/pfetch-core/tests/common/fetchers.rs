//! Scripted in-process fetchers for pipeline tests.
//!
//! Ids are the last path segment of the URL. Each id can be delayed, fail a
//! number of times before succeeding, or fail forever. The fetcher records
//! attempts per id and the highest number of fetches seen running at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use pfetch_core::retry::FetchError;

/// Template every scripted test uses; the host is never contacted.
pub const TEMPLATE: &str = "http://items.test/item/%s";

/// Body the scripted fetcher returns for a throttled attempt.
pub const THROTTLED: &str = "Too Many Requests (HAP429).\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transport,
    RateLimited,
}

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    delay: Duration,
    jitter_ms: u64,
    delays: HashMap<String, Duration>,
    fail_first: HashMap<String, (u32, Failure)>,
    fail_always: HashMap<String, Failure>,
    attempts: Mutex<HashMap<String, u32>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Adds a per-id pseudo-random extra delay in `0..max_ms`.
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.jitter_ms = max_ms;
        self
    }

    pub fn delay_id(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    /// `id` fails `times` attempts, then succeeds.
    pub fn fail_first(mut self, id: &str, times: u32, failure: Failure) -> Self {
        self.fail_first.insert(id.to_string(), (times, failure));
        self
    }

    pub fn fail_always(mut self, id: &str, failure: Failure) -> Self {
        self.fail_always.insert(id.to_string(), failure);
        self
    }

    pub fn attempts(&self, id: &str) -> u32 {
        self.attempts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn delay_for(&self, id: &str) -> Duration {
        let base = self.delays.get(id).copied().unwrap_or(self.delay);
        if self.jitter_ms == 0 {
            return base;
        }
        let hash = id
            .bytes()
            .fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
        base + Duration::from_millis(hash % self.jitter_ms)
    }

    fn respond(failure: Failure) -> Result<String, FetchError> {
        match failure {
            Failure::Transport => Err(FetchError::Transport("connection refused".to_string())),
            Failure::RateLimited => Ok(THROTTLED.to_string()),
        }
    }
}

impl pfetch_core::fetch::Fetch for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let id = url.rsplit('/').next().unwrap_or(url).to_string();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(id.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let delay = self.delay_for(&id);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(&failure) = self.fail_always.get(&id) {
            return Self::respond(failure);
        }
        if let Some(&(times, failure)) = self.fail_first.get(&id) {
            if attempt <= times {
                return Self::respond(failure);
            }
        }
        Ok(format!("v{}", id))
    }
}
