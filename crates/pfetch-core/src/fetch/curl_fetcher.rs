//! libcurl GET fetcher.

use std::time::Duration;

use super::Fetch;
use crate::retry::FetchError;

/// Transport knobs applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurlOptions {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout, including reading the body.
    pub request_timeout: Duration,
    /// Max redirects to follow.
    pub max_redirections: u32,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(6),
            max_redirections: 10,
        }
    }
}

/// Fetches a URL with a plain GET. Any HTTP status with a readable body counts
/// as a response; throttling is detected from the body by the executor.
/// Proxies from `http_proxy`/`https_proxy` are honored by libcurl itself.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: CurlOptions,
}

impl CurlFetcher {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }
}

impl Fetch for CurlFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(self.opts.max_redirections)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.timeout(self.opts.request_timeout)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        tracing::trace!(url, code, bytes = body.len(), "fetched");

        // Bytes that are not UTF-8 become U+FFFD; the body was still read.
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
