//! Control socket: server (during `pfetch run`) and client (for `pfetch control`).
//! Protocol: one command per line: "set <n>", "halve" or "grow <n>". The server
//! answers each line with the new capacity or an error.

use anyhow::{bail, Context, Result};
use pfetch_core::control::{CapacityControl, ControlCommand};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `path` and spawns a task that applies every well-formed line to
/// `control`. Malformed lines are logged and answered with an error, never
/// applied. A stale socket file is replaced; one that still accepts
/// connections belongs to another run and is left alone.
pub fn spawn_control_listener(
    control: CapacityControl,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(&path).is_ok() {
            bail!("control socket {} is in use by another pfetch run", path.display());
        }
        tracing::debug!(path = %path.display(), "removing stale control socket");
        let _ = std::fs::remove_file(&path);
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = control.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &control).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(stream: UnixStream, control: &CapacityControl) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<ControlCommand>() {
            Ok(cmd) => format!("ok {}\n", control.apply(cmd)),
            Err(e) => {
                tracing::warn!(line = %line.trim(), "ignored control command: {}", e);
                format!("error {}\n", e)
            }
        };
        write.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

/// Sends `cmd` to the socket at `socket_path` and returns the new capacity.
pub async fn send_command(socket_path: &Path, cmd: ControlCommand) -> Result<usize> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {} (is `pfetch run` active?)", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{}\n", cmd).as_bytes()).await?;
    write.shutdown().await?;

    let mut lines = BufReader::new(read).lines();
    let reply = lines
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    match reply.split_once(' ') {
        Some(("ok", n)) => Ok(n.trim().parse()?),
        Some(("error", msg)) => bail!("rejected: {}", msg),
        _ => bail!("unexpected control reply: {}", reply),
    }
}
