//! CLI command handlers. Each command is in its own file.

mod completions;
mod config;
mod control;
mod run;

pub use completions::{run_completions, run_man};
pub use config::run_config;
pub use control::run_control;
pub use run::run_pipeline;
