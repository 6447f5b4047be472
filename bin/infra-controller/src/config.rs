//! Controller configuration loaded from environment variables

use infra_core::RequeuePolicy;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 60;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;
pub const DEFAULT_FATAL_REQUEUE_SECS: u64 = 900;
pub const DEFAULT_DELETION_POLL_SECS: u64 = 5;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Controller configuration
///
/// Every setting has a default and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the /metrics and /healthz server
    pub metrics_port: u16,
    /// Periodic resync of converged objects (seconds)
    pub sync_period_secs: u64,
    /// First retry delay after a failed pass (milliseconds)
    pub initial_backoff_ms: u64,
    /// Cap of the retry delay (seconds)
    pub max_backoff_secs: u64,
    /// Retry delay after an error only a spec change can fix (seconds)
    pub fatal_requeue_secs: u64,
    /// Poll interval while an external resource is being deleted (seconds)
    pub deletion_poll_secs: u64,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            sync_period_secs: DEFAULT_SYNC_PERIOD_SECS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            fatal_requeue_secs: DEFAULT_FATAL_REQUEUE_SECS,
            deletion_poll_secs: DEFAULT_DELETION_POLL_SECS,
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            sync_period_secs: env_var_or_default("SYNC_PERIOD_SECS", DEFAULT_SYNC_PERIOD_SECS),
            initial_backoff_ms: env_var_or_default(
                "INITIAL_BACKOFF_MS",
                DEFAULT_INITIAL_BACKOFF_MS,
            ),
            max_backoff_secs: env_var_or_default("MAX_BACKOFF_SECS", DEFAULT_MAX_BACKOFF_SECS),
            fatal_requeue_secs: env_var_or_default(
                "FATAL_REQUEUE_SECS",
                DEFAULT_FATAL_REQUEUE_SECS,
            ),
            deletion_poll_secs: env_var_or_default(
                "DELETION_POLL_SECS",
                DEFAULT_DELETION_POLL_SECS,
            ),
            log_format: env_var_or_default("LOG_FORMAT", LogFormat::default()),
        }
    }

    pub fn requeue_policy(&self) -> RequeuePolicy {
        RequeuePolicy {
            sync_period: Duration::from_secs(self.sync_period_secs),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            fatal_requeue: Duration::from_secs(self.fatal_requeue_secs),
            deletion_poll: Duration::from_secs(self.deletion_poll_secs),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
