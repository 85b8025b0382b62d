//! CLI for the pfetch parallel fetch pipeline.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pfetch_core::config::{self, OutputFormat, PfetchConfig, RetryKind};
use pfetch_core::control::ControlCommand;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_control, run_man, run_pipeline};

/// Top-level CLI for pfetch.
#[derive(Debug, Parser)]
#[command(name = "pfetch")]
#[command(
    about = "pfetch: read ids from stdin, fetch each through a URL template with bounded concurrency",
    long_about = None
)]
pub struct Cli {
    /// Log to stderr instead of the log file.
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every id read from stdin and write one record per line to stdout.
    Run(RunArgs),

    /// Send a capacity command to a running `pfetch run`.
    Control {
        #[command(subcommand)]
        command: ControlArg,
        /// Control socket path (default: XDG state dir).
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Show the config file path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page to stdout.
    Man,
}

/// Options for `pfetch run`. Each overrides the config file when given.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// URL template with exactly one `%s` replaced by the id.
    #[arg(short = 't', long, value_name = "TEMPLATE")]
    pub template: Option<String>,

    /// Maximum concurrent fetches.
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print a progress report to stderr.
    #[arg(short = 'r', long)]
    pub report: bool,

    /// Report interval in milliseconds.
    #[arg(short = 'i', long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Exact response body that means "throttled" (empty disables detection).
    #[arg(short = 'f', long, value_name = "BODY")]
    pub filter: Option<String>,

    /// Retry policy for failed fetches.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub retry: Option<RetryArg>,

    /// Attempts in total under `--retry bounded`.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Delay for `--retry indefinite` and `--retry requeue`.
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Record format on stdout.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub output: Option<OutputArg>,

    /// Print `pid: <n>` to stderr at startup.
    #[arg(short = 'p', long)]
    pub print_pid: bool,

    /// Read configuration from this file instead of the default one.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Control socket path (default: XDG state dir).
    #[arg(long, value_name = "PATH")]
    pub control_socket: Option<PathBuf>,

    /// Do not listen for control commands.
    #[arg(long)]
    pub no_control: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryArg {
    None,
    Bounded,
    Indefinite,
    Requeue,
}

impl From<RetryArg> for RetryKind {
    fn from(arg: RetryArg) -> Self {
        match arg {
            RetryArg::None => RetryKind::None,
            RetryArg::Bounded => RetryKind::Bounded,
            RetryArg::Indefinite => RetryKind::Indefinite,
            RetryArg::Requeue => RetryKind::Requeue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    Json,
    Raw,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Json => OutputFormat::Json,
            OutputArg::Raw => OutputFormat::Raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ControlArg {
    /// Set capacity to N.
    Set { n: usize },
    /// Halve capacity (never below 1).
    Halve,
    /// Add N slots.
    Grow { n: usize },
}

impl From<ControlArg> for ControlCommand {
    fn from(arg: ControlArg) -> Self {
        match arg {
            ControlArg::Set { n } => ControlCommand::SetCapacity(n),
            ControlArg::Halve => ControlCommand::Halve,
            ControlArg::Grow { n } => ControlCommand::Grow(n),
        }
    }
}

impl RunArgs {
    /// Load the config file (explicit path or XDG default) and apply flag overrides.
    pub fn effective_config(&self) -> Result<PfetchConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        self.apply_to(&mut cfg);
        Ok(cfg)
    }

    pub fn apply_to(&self, cfg: &mut PfetchConfig) {
        if let Some(template) = &self.template {
            cfg.template = template.clone();
        }
        if let Some(jobs) = self.jobs {
            cfg.max_concurrency = jobs;
        }
        if self.report {
            cfg.report.enabled = true;
        }
        if let Some(ms) = self.interval_ms {
            cfg.report.interval_ms = ms;
        }
        if let Some(filter) = &self.filter {
            cfg.filter = filter.clone();
        }
        if let Some(retry) = self.retry {
            cfg.retry.policy = retry.into();
        }
        if let Some(n) = self.max_attempts {
            cfg.retry.max_attempts = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            cfg.retry.delay_ms = ms;
        }
        if let Some(output) = self.output {
            cfg.output = output.into();
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            CliCommand::Run(args) => {
                let cfg = args.effective_config()?;
                tracing::debug!("effective config: {:?}", cfg);
                run_pipeline(&cfg, &args).await?;
            }
            CliCommand::Control { command, socket } => {
                run_control(command.into(), socket.as_deref()).await?
            }
            CliCommand::Config => run_config()?,
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Man => run_man()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
