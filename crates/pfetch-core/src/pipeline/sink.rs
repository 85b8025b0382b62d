//! Result sink: drain completed results to the output in arrival order.

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::OutputFormat;
use crate::fetch::FetchResult;
use crate::stats::PipelineStats;

/// Render one record, without the trailing newline.
pub fn format_record(result: &FetchResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(result).context("serialize record"),
        OutputFormat::Raw => Ok(result.value.trim_end_matches(&['\r', '\n'][..]).to_string()),
    }
}

/// Write every result from `rx` until the queue closes, counting each one.
/// Flushes before returning, so when this resolves every record is out.
pub async fn drain<W>(
    mut rx: mpsc::Receiver<FetchResult>,
    writer: &mut W,
    format: OutputFormat,
    stats: &PipelineStats,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(result) = rx.recv().await {
        let mut line = format_record(&result, format)?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("write record")?;
        writer.flush().await.context("flush output")?;
        stats.record_completed();
        written += 1;
    }
    writer.flush().await.context("flush output")?;
    tracing::debug!(written, "output closed");
    Ok(written)
}
