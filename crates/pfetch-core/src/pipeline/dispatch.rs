//! Dispatcher: admit identifiers into the limiter and run each as its own task.
//!
//! Every admitted identifier holds a [`WorkGuard`] until it is done for good:
//! completed, abandoned, or cancelled. Delayed requeues carry their guard
//! through the sleep and through the requeue queue, so the outstanding count
//! cannot reach zero while a requeue is pending. Once input has ended and the
//! count is zero, the dispatcher drops its output sender and returns.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchResult, TaskExecutor};
use crate::limiter::{ConcurrencyLimiter, SlotPermit, WorkCounter, WorkGuard};
use crate::retry::{self, FetchError, RetryDecision, RetryOutcome, RetryPolicy};
use crate::stats::PipelineStats;
use crate::task::TaskFactory;

/// An identifier waiting for a fresh admission after a failed attempt.
#[derive(Debug)]
struct Requeued {
    id: String,
    next_attempt: u32,
    guard: WorkGuard,
}

/// Shared, read-only state handed to every spawned fetch.
pub(crate) struct TaskContext {
    pub(crate) factory: TaskFactory,
    pub(crate) executor: TaskExecutor,
    pub(crate) policy: RetryPolicy,
    pub(crate) stats: Arc<PipelineStats>,
    pub(crate) cancel: CancellationToken,
}

/// Counts from one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DispatchSummary {
    /// Identifiers taken from the input queue.
    pub(crate) admitted: u64,
    /// Fresh admissions of requeued identifiers.
    pub(crate) readmitted: u64,
}

pub(crate) struct Dispatcher {
    limiter: Arc<ConcurrencyLimiter>,
    outstanding: Arc<WorkCounter>,
    ctx: Arc<TaskContext>,
}

impl Dispatcher {
    pub(crate) fn new(limiter: Arc<ConcurrencyLimiter>, ctx: Arc<TaskContext>) -> Self {
        Self {
            limiter,
            outstanding: Arc::new(WorkCounter::new()),
            ctx,
        }
    }

    /// Run until `input` ends (or the run is cancelled) and all admitted work
    /// has finished. `output` is dropped only after that point.
    pub(crate) async fn run(
        self,
        mut input: mpsc::Receiver<String>,
        output: mpsc::Sender<FetchResult>,
    ) -> DispatchSummary {
        let cancel = self.ctx.cancel.clone();
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<Requeued>();
        let mut tasks = JoinSet::new();
        let mut input_done = false;
        let mut summary = DispatchSummary::default();

        loop {
            let (id, attempt, guard) = tokio::select! {
                biased;
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                    continue;
                }
                Some(item) = requeue_rx.recv() => {
                    if cancel.is_cancelled() {
                        self.abandon(&item.id, item.next_attempt - 1);
                        continue;
                    }
                    summary.readmitted += 1;
                    (item.id, item.next_attempt, item.guard)
                }
                _ = cancel.cancelled(), if !input_done => {
                    tracing::info!("run cancelled; no further identifiers admitted");
                    input_done = true;
                    input.close();
                    continue;
                }
                next = input.recv(), if !input_done => match next {
                    Some(id) => {
                        summary.admitted += 1;
                        self.ctx.stats.record_admitted();
                        (id, 1, self.outstanding.enter())
                    }
                    None => {
                        tracing::debug!(outstanding = self.outstanding.count(), "input exhausted");
                        input_done = true;
                        continue;
                    }
                },
                _ = self.outstanding.wait_idle(), if input_done => break,
            };

            let permit = tokio::select! {
                permit = self.limiter.acquire() => permit,
                _ = cancel.cancelled() => {
                    self.abandon(&id, attempt - 1);
                    drop(guard);
                    continue;
                }
            };

            tasks.spawn(run_task(
                Arc::clone(&self.ctx),
                id,
                attempt,
                permit,
                guard,
                output.clone(),
                requeue_tx.clone(),
            ));
        }

        // Outstanding is zero: no task can send any more.
        drop(output);
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::debug!(
            admitted = summary.admitted,
            readmitted = summary.readmitted,
            "dispatcher finished"
        );
        summary
    }

    fn abandon(&self, id: &str, attempts: u32) {
        self.ctx.stats.record_failed();
        tracing::info!(id, attempts, "abandoned: run cancelled");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("fetch task failed: {}", e);
    }
}

/// Execute one identifier under the retry policy. Owns its id, slot and work
/// guard; the slot is released on every path, the guard only once the
/// identifier is finished or handed to the requeue queue.
async fn run_task(
    ctx: Arc<TaskContext>,
    id: String,
    first_attempt: u32,
    permit: SlotPermit,
    guard: WorkGuard,
    output: mpsc::Sender<FetchResult>,
    requeue: mpsc::UnboundedSender<Requeued>,
) {
    let stats = Arc::clone(&ctx.stats);
    let outcome = retry::run_with_retry(
        &ctx.policy,
        first_attempt,
        &ctx.cancel,
        |attempt, error: &FetchError, decision| {
            if matches!(error, FetchError::RateLimited) {
                stats.record_rate_limited();
            }
            if decision != RetryDecision::GiveUp {
                stats.record_retry();
            }
            tracing::debug!(id = %id, attempt, ?decision, "fetch failed: {}", error);
        },
        |attempt| {
            let ctx = Arc::clone(&ctx);
            let id = id.clone();
            async move {
                let mut task = ctx.factory.build(&id);
                let result = ctx.executor.execute(&mut task).await;
                tracing::trace!(
                    id = %task.id,
                    attempt,
                    elapsed_ms = task.elapsed().map(|d| d.as_millis() as u64),
                    ok = result.is_ok(),
                    "attempt finished"
                );
                result
            }
        },
    )
    .await;

    match outcome {
        RetryOutcome::Succeeded { value, attempts } => {
            if attempts > 1 {
                tracing::debug!(id = %id, attempts, "succeeded after retry");
            }
            if output.send(value).await.is_err() {
                tracing::warn!(id = %id, "output closed; result dropped");
            }
        }
        RetryOutcome::GaveUp { error, attempts } => {
            stats.record_failed();
            tracing::warn!(id = %id, attempts, "permanently failed: {}", error);
        }
        RetryOutcome::Cancelled { attempts } => {
            stats.record_failed();
            tracing::info!(id = %id, attempts, "abandoned: run cancelled");
        }
        RetryOutcome::Requeue { delay, attempts } => {
            // Give the slot back while waiting; keep the guard.
            drop(permit);
            if !retry::sleep_or_cancel(delay, &ctx.cancel).await {
                stats.record_failed();
                tracing::info!(id = %id, attempts, "abandoned: run cancelled");
                return;
            }
            let item = Requeued {
                id,
                next_attempt: attempts + 1,
                guard,
            };
            if let Err(mpsc::error::SendError(item)) = requeue.send(item) {
                stats.record_failed();
                tracing::warn!(id = %item.id, attempts, "requeue refused; dispatcher gone");
            }
        }
    }
}
