//! Retry loop: run an attempt until success or the policy says stop.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// How a retry loop ended.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// Policy gave up; `error` is the last failure.
    GaveUp { error: FetchError, attempts: u32 },
    /// Caller should release its slot and resubmit after `delay`.
    /// `attempts` is the number of attempts made so far.
    Requeue { delay: Duration, attempts: u32 },
    /// The run was cancelled while waiting to retry.
    Cancelled { attempts: u32 },
}

/// Runs `attempt_fn` until it succeeds or the retry policy says to stop.
///
/// `first_attempt` is 1 for a fresh identifier and larger after a requeue.
/// `on_failure` sees every failed attempt together with the decision taken.
/// Backoff sleeps race `cancel`; an attempt already running is never interrupted.
pub async fn run_with_retry<T, F, Fut, O>(
    policy: &RetryPolicy,
    first_attempt: u32,
    cancel: &CancellationToken,
    mut on_failure: O,
    mut attempt_fn: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    O: FnMut(u32, &FetchError, RetryDecision),
{
    let mut attempt = first_attempt.max(1);
    loop {
        let error = match attempt_fn(attempt).await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(e) => e,
        };
        let decision = policy.decide(attempt, classify::classify(&error));
        on_failure(attempt, &error, decision);
        match decision {
            RetryDecision::GiveUp => {
                return RetryOutcome::GaveUp {
                    error,
                    attempts: attempt,
                }
            }
            RetryDecision::Requeue(delay) => {
                return RetryOutcome::Requeue {
                    delay,
                    attempts: attempt,
                }
            }
            RetryDecision::RetryNow => {
                if cancel.is_cancelled() {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            }
            RetryDecision::RetryAfter(delay) => {
                if !sleep_or_cancel(delay, cancel).await {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            }
        }
        attempt += 1;
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns false if cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
