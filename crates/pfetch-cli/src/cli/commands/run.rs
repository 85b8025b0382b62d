//! `pfetch run` – fetch ids from stdin, records to stdout, progress to stderr.

use anyhow::Result;
use pfetch_core::config::PfetchConfig;
use pfetch_core::control::default_control_socket_path;
use pfetch_core::report::Reporter;
use pfetch_core::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

use crate::cli::{control_socket, RunArgs};

pub async fn run_pipeline(cfg: &PfetchConfig, args: &RunArgs) -> Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;

    if args.print_pid {
        eprintln!("pid: {}", std::process::id());
    }

    let control = if args.no_control {
        None
    } else {
        start_control(&pipeline, args.control_socket.clone())
    };

    let cancel = pipeline.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; finishing in-flight fetches");
            cancel.cancel();
        }
    });

    let reporter = cfg.report.enabled.then(|| {
        Reporter::start(
            cfg.report_interval(),
            Arc::clone(pipeline.limiter()),
            Arc::clone(pipeline.stats()),
            tokio::io::stderr(),
        )
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let result = pipeline.run(stdin, tokio::io::stdout()).await;

    if let Some(reporter) = reporter {
        if let Err(e) = reporter.stop().await {
            tracing::warn!("progress report: {}", e);
        }
    }
    interrupt.abort();
    if let Some((handle, path)) = control {
        handle.abort();
        let _ = std::fs::remove_file(&path);
    }

    let summary = result?;
    if summary.failed > 0 {
        tracing::warn!(
            "{} of {} id(s) failed",
            summary.failed,
            summary.admitted
        );
    }
    Ok(())
}

fn start_control(
    pipeline: &Pipeline,
    path: Option<PathBuf>,
) -> Option<(tokio::task::JoinHandle<()>, PathBuf)> {
    let path = match path {
        Some(p) => p,
        None => match default_control_socket_path() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("no control socket path: {}", e);
                return None;
            }
        },
    };
    match control_socket::spawn_control_listener(pipeline.control(), &path) {
        Ok(handle) => {
            tracing::debug!(path = %path.display(), "control socket listening");
            Some((handle, path))
        }
        Err(e) => {
            tracing::warn!("control socket disabled: {:#}", e);
            None
        }
    }
}
