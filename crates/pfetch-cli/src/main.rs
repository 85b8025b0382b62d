use clap::Parser;
use pfetch_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Records own stdout; keep diagnostics in the log file unless asked otherwise.
    if cli.log_stderr {
        logging::init_logging_stderr();
    } else if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
    }

    if let Err(err) = cli.run().await {
        eprintln!("pfetch error: {:#}", err);
        std::process::exit(1);
    }
}
