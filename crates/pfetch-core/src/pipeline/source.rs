//! Identifier source: one identifier per line.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Reads trimmed, non-blank lines. End of input is `Ok(None)`, never an empty id.
///
/// Lines are split on raw bytes; invalid UTF-8 is replaced with U+FFFD rather
/// than treated as a read error, so one bad line never ends the input.
pub struct Source<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> Source<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next identifier, skipping blank and whitespace-only lines.
    pub async fn next_id(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&self.buf);
            if line.contains(char::REPLACEMENT_CHARACTER) {
                tracing::debug!("input line is not valid UTF-8: {:?}", line);
            }
            let id = line.trim();
            if !id.is_empty() {
                return Ok(Some(id.to_string()));
            }
        }
    }

    /// Push `first` and every following identifier into `tx`, then drop `tx`
    /// to signal end of input. Stops early on a read error (logged), when the
    /// receiver goes away, or when `cancel` fires.
    pub(crate) async fn feed(
        mut self,
        first: Option<String>,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> u64 {
        let mut read = 0u64;
        let mut next = first;
        while let Some(id) = next.take() {
            if tx.send(id).await.is_err() {
                tracing::debug!("identifier queue closed; stop reading input");
                return read;
            }
            read += 1;
            next = tokio::select! {
                _ = cancel.cancelled() => None,
                line = self.next_id() => match line {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!("input read failed after {} identifiers: {}", read, e);
                        None
                    }
                },
            };
        }
        tracing::debug!(read, "end of input");
        read
    }
}
