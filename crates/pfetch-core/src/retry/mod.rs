//! Retry and backoff policy.
//!
//! This module encapsulates error classification (transport, body read,
//! throttling) and the retry mode selected at startup so that the dispatcher
//! treats every failure the same way.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryMode, RetryPolicy, RATE_LIMIT_ATTEMPTS};
pub use run::{run_with_retry, sleep_or_cancel, RetryOutcome};
