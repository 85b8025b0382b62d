use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::CurlOptions;
use crate::retry::{RetryMode, RetryPolicy};
use crate::task::{TemplateError, UrlTemplate};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Which retry mode to use (`[retry] policy = "..."`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryKind {
    #[default]
    None,
    Bounded,
    Indefinite,
    Requeue,
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub policy: RetryKind,
    /// Attempts in total for `bounded` (including the first).
    pub max_attempts: u32,
    /// Delay between attempts for `indefinite`, before resubmission for `requeue`.
    pub delay_ms: u64,
    /// Backoff for rate-limited fetches when `policy = "none"`.
    pub rate_limit_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryKind::None,
            max_attempts: 4,
            delay_ms: 1000,
            rate_limit_backoff_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        let mode = match self.policy {
            RetryKind::None => RetryMode::None,
            RetryKind::Bounded => RetryMode::BoundedAttempts(self.max_attempts.max(1)),
            RetryKind::Indefinite => RetryMode::IndefiniteWithBackoff(delay),
            RetryKind::Requeue => RetryMode::RequeueWithDelay(delay),
        };
        RetryPolicy {
            mode,
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
        }
    }
}

/// Progress report settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 1000,
        }
    }
}

/// HTTP timeouts. Both bound how long one fetch can hold a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 3000,
            request_ms: 6000,
        }
    }
}

impl TimeoutConfig {
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_millis(self.connect_ms),
            request_timeout: Duration::from_millis(self.request_ms),
            ..CurlOptions::default()
        }
    }
}

/// How records are written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Compact JSON object per line: `{"id":"..","value":".."}`.
    #[default]
    Json,
    /// The body only, trailing newline trimmed.
    Raw,
}

/// Global configuration loaded from `~/.config/pfetch/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfetchConfig {
    /// URL template with exactly one `%s`.
    pub template: String,
    /// Maximum concurrent fetches.
    pub max_concurrency: usize,
    /// Exact body a throttling server returns.
    pub filter: String,
    pub output: OutputFormat,
    pub report: ReportConfig,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
}

impl Default for PfetchConfig {
    fn default() -> Self {
        Self {
            template: "https://hacker-news.firebaseio.com/v0/item/%s.json".to_string(),
            max_concurrency: 3,
            filter: "Too Many Requests (HAP429).\n".to_string(),
            output: OutputFormat::Json,
            report: ReportConfig::default(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl PfetchConfig {
    /// Check everything the pipeline relies on; returns the parsed template.
    pub fn validate(&self) -> Result<UrlTemplate, ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::NotPositive("max_concurrency"));
        }
        if self.report.interval_ms == 0 {
            return Err(ConfigError::NotPositive("report.interval_ms"));
        }
        if self.timeouts.connect_ms == 0 {
            return Err(ConfigError::NotPositive("timeouts.connect_ms"));
        }
        if self.timeouts.request_ms == 0 {
            return Err(ConfigError::NotPositive("timeouts.request_ms"));
        }
        if self.retry.policy == RetryKind::Bounded && self.retry.max_attempts == 0 {
            return Err(ConfigError::NotPositive("retry.max_attempts"));
        }
        Ok(UrlTemplate::parse(&self.template)?)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report.interval_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. Missing keys take defaults.
pub fn load_from_path(path: &Path) -> Result<PfetchConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: PfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PfetchConfig::default();
        assert_eq!(cfg.max_concurrency, 3);
        assert_eq!(cfg.filter, "Too Many Requests (HAP429).\n");
        assert!(!cfg.report.enabled);
        assert_eq!(cfg.report.interval_ms, 1000);
        assert_eq!(cfg.timeouts.connect_ms, 3000);
        assert_eq!(cfg.timeouts.request_ms, 6000);
        assert_eq!(cfg.retry.policy, RetryKind::None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = PfetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            template = "http://localhost:9000/items/%s"
            max_concurrency = 8
        "#;
        let cfg: PfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.template, "http://localhost:9000/items/%s");
        assert_eq!(cfg.report, ReportConfig::default());
        assert_eq!(cfg.output, OutputFormat::Json);
    }

    #[test]
    fn config_toml_retry_and_report() {
        let toml = r#"
            output = "raw"

            [report]
            enabled = true
            interval_ms = 250

            [timeouts]
            connect_ms = 500
            request_ms = 2000

            [retry]
            policy = "bounded"
            max_attempts = 3
        "#;
        let cfg: PfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.output, OutputFormat::Raw);
        assert!(cfg.report.enabled);
        assert_eq!(cfg.report_interval(), Duration::from_millis(250));
        assert_eq!(
            cfg.timeouts.curl_options().request_timeout,
            Duration::from_secs(2)
        );
        assert_eq!(cfg.retry.to_policy().mode, RetryMode::BoundedAttempts(3));
    }

    #[test]
    fn retry_kinds_map_to_modes() {
        let mut retry = RetryConfig {
            delay_ms: 250,
            ..RetryConfig::default()
        };
        assert_eq!(retry.to_policy().mode, RetryMode::None);
        retry.policy = RetryKind::Indefinite;
        assert_eq!(
            retry.to_policy().mode,
            RetryMode::IndefiniteWithBackoff(Duration::from_millis(250))
        );
        retry.policy = RetryKind::Requeue;
        assert_eq!(
            retry.to_policy().mode,
            RetryMode::RequeueWithDelay(Duration::from_millis(250))
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = PfetchConfig {
            max_concurrency: 0,
            ..PfetchConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive("max_concurrency"))
        ));
        cfg.max_concurrency = 2;
        cfg.template = "https://example.com/item.json".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Template(TemplateError::MissingPlaceholder(_)))
        ));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_concurrency = 12\n[retry]\npolicy = \"requeue\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.max_concurrency, 12);
        assert_eq!(cfg.retry.policy, RetryKind::Requeue);
        assert!(load_from_path(&dir.path().join("missing.toml")).is_err());
    }
}
