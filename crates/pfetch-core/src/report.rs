//! Periodic progress report (capacity, occupancy, completions, retries).
//!
//! Runs as its own task next to the pipeline. Output goes to an injected
//! writer (stderr in the CLI) so records on stdout stay clean.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::limiter::ConcurrencyLimiter;
use crate::stats::{PipelineStats, StatsSnapshot};

/// Column header printed once when reporting starts.
pub fn header_line() -> String {
    format!(
        "{:>8} {:>8} {:<8} +{:<8} {:<8} +{:<8}\n",
        "cap", "used", "done", "diff", "retry", "rdiff"
    )
}

/// One report row; deltas are relative to the previous row.
pub fn snapshot_line(now: &StatsSnapshot, prev: &StatsSnapshot) -> String {
    format!(
        "{:>8} {:>8} {:<8} +{:<8} {:<8} +{:<8}\n",
        now.capacity,
        now.occupied,
        now.completed,
        now.completed.saturating_sub(prev.completed),
        now.retried,
        now.retried.saturating_sub(prev.retried),
    )
}

struct ReportLoop<W> {
    writer: W,
    limiter: Arc<ConcurrencyLimiter>,
    stats: Arc<PipelineStats>,
    prev: StatsSnapshot,
}

impl<W: AsyncWrite + Unpin> ReportLoop<W> {
    async fn emit(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn emit_once(&mut self) -> io::Result<()> {
        let now = self
            .stats
            .snapshot(self.limiter.capacity(), self.limiter.occupied());
        let line = snapshot_line(&now, &self.prev);
        self.prev = now;
        self.emit(&line).await
    }

    async fn run(&mut self, interval: Duration, cancel: CancellationToken) -> io::Result<()> {
        self.emit(&header_line()).await?;
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => self.emit_once().await?,
            }
        }
    }
}

/// Starts and owns the reporting task.
pub struct Reporter;

impl Reporter {
    /// Spawn the loop: header, then one row per `interval` (first row
    /// immediately) until the handle is stopped. Missed ticks are skipped.
    pub fn start<W>(
        interval: Duration,
        limiter: Arc<ConcurrencyLimiter>,
        stats: Arc<PipelineStats>,
        writer: W,
    ) -> ReporterHandle<W>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut state = ReportLoop {
            writer,
            limiter,
            stats,
            prev: StatsSnapshot::default(),
        };
        let join = tokio::spawn(async move {
            if let Err(e) = state.run(interval, token).await {
                tracing::warn!("progress report stopped: {}", e);
            }
            state
        });
        ReporterHandle { cancel, join }
    }
}

/// Handle to a running reporter.
pub struct ReporterHandle<W> {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<ReportLoop<W>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> ReporterHandle<W> {
    /// Cancel the ticking loop, print one final row and hand the writer back.
    pub async fn stop(self) -> io::Result<W> {
        self.cancel.cancel();
        let mut state = self
            .join
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("reporter join: {}", e)))?;
        state.emit_once().await?;
        Ok(state.writer)
    }
}
