//! Execute one task: fetch its URL and classify the response.
//!
//! Fetchers are blocking (libcurl), so the executor runs them on tokio's
//! blocking pool. The slot held for a task covers the whole fetch; the
//! timeouts in [`CurlOptions`] are what keep a hung server from pinning it.

mod curl_fetcher;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::retry::FetchError;
use crate::task::Task;

pub use curl_fetcher::{CurlFetcher, CurlOptions};

/// Output of a successful task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub id: String,
    pub value: String,
}

/// Blocking transport: GET `url` and return the body as text.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<String, FetchError> + Send + Sync + 'static,
{
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self(url)
    }
}

/// Runs tasks through a [`Fetch`] and applies the rate-limit filter.
#[derive(Clone)]
pub struct TaskExecutor {
    fetcher: Arc<dyn Fetch>,
    filter: Option<Arc<str>>,
}

impl TaskExecutor {
    /// `filter` is the exact body a throttling server returns; empty disables it.
    pub fn new(fetcher: Arc<dyn Fetch>, filter: &str) -> Self {
        Self {
            fetcher,
            filter: (!filter.is_empty()).then(|| Arc::from(filter)),
        }
    }

    /// Execute `task` once. Stamps `started_at`/`finished_at` on the task.
    pub async fn execute(&self, task: &mut Task) -> Result<FetchResult, FetchError> {
        task.started_at = Some(Instant::now());
        let fetcher = Arc::clone(&self.fetcher);
        let url = task.url.clone();
        let body = tokio::task::spawn_blocking(move || fetcher.fetch(&url))
            .await
            .map_err(|e| FetchError::Transport(format!("fetch task join: {}", e)));
        task.finished_at = Some(Instant::now());

        let body = body??;
        if self.filter.as_deref() == Some(body.as_str()) {
            return Err(FetchError::RateLimited);
        }
        Ok(FetchResult {
            id: task.id.clone(),
            value: body,
        })
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
