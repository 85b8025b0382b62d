use std::time::Duration;

/// Minimum attempts a rate-limited fetch gets under `None` and `BoundedAttempts`.
pub const RATE_LIMIT_ATTEMPTS: u32 = 4;

/// High-level classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect, DNS, TLS or timeout failure.
    Transport,
    /// Connected, but the body could not be read.
    BodyRead,
    /// Server throttling signal (body matched the filter string).
    RateLimited,
}

/// How failed fetches are retried. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// Drop on failure. Rate-limited fetches still get a few backed-off attempts.
    None,
    /// Re-run in the same task, immediately, up to this many attempts in total.
    /// Rate-limited fetches always get at least `RATE_LIMIT_ATTEMPTS`; attempts
    /// past the bound are backed off.
    BoundedAttempts(u32),
    /// Re-run in the same task after a fixed delay until it succeeds or the run is cancelled.
    IndefiniteWithBackoff(Duration),
    /// Give the slot back and resubmit the identifier for a fresh admission after a delay.
    RequeueWithDelay(Duration),
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Abandon the identifier.
    GiveUp,
    /// Try again right away, keeping the slot.
    RetryNow,
    /// Try again after the delay, keeping the slot.
    RetryAfter(Duration),
    /// Release the slot and resubmit the identifier after the delay.
    Requeue(Duration),
}

/// Retry mode plus the backoff used for rate-limited fetches under `RetryMode::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub mode: RetryMode,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            mode: RetryMode::None,
            rate_limit_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(mode: RetryMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Decide what to do after a failed attempt.
    ///
    /// `attempt` is 1-based and counts attempts of the current identifier,
    /// including attempts made before a requeue.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        match self.mode {
            RetryMode::None => match kind {
                ErrorKind::RateLimited if attempt < RATE_LIMIT_ATTEMPTS => {
                    RetryDecision::RetryAfter(self.rate_limit_backoff)
                }
                _ => RetryDecision::GiveUp,
            },
            RetryMode::BoundedAttempts(max) => {
                if attempt < max {
                    RetryDecision::RetryNow
                } else if kind == ErrorKind::RateLimited && attempt < RATE_LIMIT_ATTEMPTS {
                    RetryDecision::RetryAfter(self.rate_limit_backoff)
                } else {
                    RetryDecision::GiveUp
                }
            }
            RetryMode::IndefiniteWithBackoff(delay) => RetryDecision::RetryAfter(delay),
            RetryMode::RequeueWithDelay(delay) => RetryDecision::Requeue(delay),
        }
    }
}
