//! The fetch pipeline: source, dispatcher and sink wired by bounded queues.
//!
//! `Source -> Dispatcher(limiter, factory, executor) -> sink`. The dispatcher
//! drops the result sender only once input has ended and no admitted work is
//! outstanding, so the sink sees every result before the queue closes.
//! [`Pipeline::run`] returns after both the dispatcher and the sink are done.

mod dispatch;
mod sink;
mod source;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{OutputFormat, PfetchConfig};
use crate::control::CapacityControl;
use crate::fetch::{CurlFetcher, Fetch, TaskExecutor};
use crate::limiter::ConcurrencyLimiter;
use crate::retry::RetryPolicy;
use crate::stats::PipelineStats;
use crate::task::TaskFactory;

use dispatch::{Dispatcher, TaskContext};

pub use sink::{drain, format_record};
pub use source::Source;

/// Final counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub admitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub rate_limited: u64,
    /// Fresh admissions of requeued identifiers.
    pub readmitted: u64,
}

/// Everything one run shares: limiter, counters and the cancellation token.
pub struct Pipeline {
    limiter: Arc<ConcurrencyLimiter>,
    stats: Arc<PipelineStats>,
    ctx: Arc<TaskContext>,
    format: OutputFormat,
}

impl Pipeline {
    /// Build a pipeline that fetches with libcurl using the configured timeouts.
    pub fn from_config(cfg: &PfetchConfig) -> Result<Self> {
        let fetcher = CurlFetcher::new(cfg.timeouts.curl_options());
        Self::with_fetcher(cfg, Arc::new(fetcher))
    }

    /// Build a pipeline around any [`Fetch`] implementation.
    pub fn with_fetcher(cfg: &PfetchConfig, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let template = cfg.validate().context("invalid configuration")?;
        let policy = cfg.retry.to_policy();
        Ok(Self::new(
            TaskFactory::new(template),
            TaskExecutor::new(fetcher, &cfg.filter),
            policy,
            cfg.max_concurrency,
            cfg.output,
        ))
    }

    pub fn new(
        factory: TaskFactory,
        executor: TaskExecutor,
        policy: RetryPolicy,
        max_concurrency: usize,
        format: OutputFormat,
    ) -> Self {
        let stats = Arc::new(PipelineStats::new());
        let ctx = TaskContext {
            factory,
            executor,
            policy,
            stats: Arc::clone(&stats),
            cancel: CancellationToken::new(),
        };
        Self {
            limiter: Arc::new(ConcurrencyLimiter::new(max_concurrency)),
            stats,
            ctx: Arc::new(ctx),
            format,
        }
    }

    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Token that stops admission and abandons pending retries when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn control(&self) -> CapacityControl {
        CapacityControl::new(Arc::clone(&self.limiter))
    }

    /// Read identifiers from `reader`, fetch them, write records to `writer`.
    ///
    /// An error reading the first identifier fails the run before anything
    /// starts; later read errors end input early. Write errors cancel the run
    /// and are returned once in-flight work has drained.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut source = Source::new(reader);
        let first = source.next_id().await.context("read first identifier")?;
        if first.is_none() {
            tracing::info!("no identifiers on input");
        }

        let cancel = self.cancel_token();
        let (id_tx, id_rx) = mpsc::channel::<String>(1);
        let (out_tx, out_rx) = mpsc::channel(self.limiter.capacity());
        let dispatcher = Dispatcher::new(Arc::clone(&self.limiter), Arc::clone(&self.ctx));

        tracing::info!(
            capacity = self.limiter.capacity(),
            policy = ?self.ctx.policy.mode,
            template = %self.ctx.factory.template(),
            "pipeline started"
        );

        let feed = source.feed(first, id_tx, cancel.clone());
        let dispatch = dispatcher.run(id_rx, out_tx);
        let sink = async {
            let written = drain(out_rx, &mut writer, self.format, &self.stats).await;
            if written.is_err() {
                cancel.cancel();
            }
            written
        };
        let (read, dispatched, written) = tokio::join!(feed, dispatch, sink);
        let written = written?;

        let snap = self.stats.snapshot(self.limiter.capacity(), self.limiter.occupied());
        let summary = RunSummary {
            admitted: snap.admitted,
            completed: snap.completed,
            failed: snap.failed,
            retried: snap.retried,
            rate_limited: snap.rate_limited,
            readmitted: dispatched.readmitted,
        };
        tracing::info!(
            read,
            written,
            failed = summary.failed,
            retried = summary.retried,
            rate_limited = summary.rate_limited,
            readmitted = summary.readmitted,
            "pipeline finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("capacity", &self.limiter.capacity())
            .field("policy", &self.ctx.policy)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
