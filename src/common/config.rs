//! Runner configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Default settings applied to every suite
    #[serde(default)]
    pub defaults: Defaults,

    /// Retry defaults for specs that declare `retry` without values
    #[serde(default)]
    pub retry: RetryDefaults,

    /// Parallel execution limits
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Report output settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Default settings
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Read timeout used when a suite does not declare one
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout(),
        }
    }
}

fn default_read_timeout() -> u64 {
    60_000
}

/// Retry defaults
#[derive(Debug, Deserialize, Clone)]
pub struct RetryDefaults {
    /// Extra attempts after the first failed validation
    #[serde(default = "default_retry_count")]
    pub count: u32,

    /// Pause before every extra attempt
    #[serde(default = "default_retry_wait")]
    pub wait_before_each_ms: u64,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            count: default_retry_count(),
            wait_before_each_ms: default_retry_wait(),
        }
    }
}

fn default_retry_count() -> u32 {
    1
}
fn default_retry_wait() -> u64 {
    100
}

/// Parallel execution configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ParallelConfig {
    /// Highest value accepted by `--parallel`
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_limit: default_max_limit(),
        }
    }
}

fn default_max_limit() -> usize {
    40
}

/// Report output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Directory the JSON report is written to
    #[serde(default = "default_json_dir")]
    pub json_dir: String,

    /// File name of the JSON report, without extension
    #[serde(default = "default_report_name")]
    pub json_name: String,

    #[serde(default = "default_json_dir")]
    pub html_dir: String,

    #[serde(default = "default_report_name")]
    pub html_name: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            json_dir: default_json_dir(),
            json_name: default_report_name(),
            html_dir: default_json_dir(),
            html_name: default_report_name(),
        }
    }
}

fn default_json_dir() -> String {
    ".".to_string()
}
fn default_report_name() -> String {
    "report".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read file '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid configuration file: {}", e)))
    }
}
