pub mod config;
pub mod control;
pub mod fetch;
pub mod limiter;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod stats;
pub mod task;

pub use pipeline::{Pipeline, RunSummary};
