//! Application configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level queuectl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Data directory configuration.
    #[serde(default)]
    pub data: DataConfig,

    /// Retry policy configuration.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Dashboard server configuration.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            retry: RetryConfig::default(),
            worker: WorkerConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Data directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding the job and dead-letter files.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Exponential backoff base.
    #[serde(default = "default_base")]
    pub base: u32,

    /// Default per-job retry ceiling.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    3
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Polling interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_worker_count() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    2000
}

impl WorkerConfig {
    /// Returns the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Dashboard server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl DashboardConfig {
    /// Returns the socket address string for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
