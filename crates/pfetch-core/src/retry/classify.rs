//! Classify fetch and curl errors into retry policy error kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify a curl error. Failures after the connection was established and
/// data started flowing count as body read failures; everything else
/// (DNS, connect, TLS, timeouts) is a transport failure.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_write_error()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_partial_file()
        || e.is_bad_content_encoding()
    {
        return ErrorKind::BodyRead;
    }
    ErrorKind::Transport
}

/// Classify a fetch error into an ErrorKind.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Transport(_) => ErrorKind::Transport,
        FetchError::BodyRead(_) => ErrorKind::BodyRead,
        FetchError::RateLimited => ErrorKind::RateLimited,
    }
}
