//! Fetch error type for retry classification.

use std::fmt;

/// Error returned by a single fetch attempt. A failed attempt never carries a
/// partial result; the body is either fully read and matched, or discarded.
#[derive(Debug)]
pub enum FetchError {
    /// libcurl reported an error (timeout, connection, read failure, etc.).
    Curl(curl::Error),
    /// Transport failure that did not come from libcurl (e.g. the blocking
    /// task was lost, or a non-curl fetcher failed to connect).
    Transport(String),
    /// Connected, but the response body could not be read as text.
    BodyRead(String),
    /// Body matched the configured throttling filter exactly.
    RateLimited,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Transport(msg) => write!(f, "transport: {}", msg),
            FetchError::BodyRead(msg) => write!(f, "body read: {}", msg),
            FetchError::RateLimited => write!(f, "rate limited"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Transport(_) | FetchError::BodyRead(_) | FetchError::RateLimited => None,
        }
    }
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::Curl(e)
    }
}
