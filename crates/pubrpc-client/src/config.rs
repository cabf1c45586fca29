//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Correlation client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout window. An acknowledgement restarts it.
    pub request_timeout: Duration,
    /// Explicit sweep cadence. When unset the cadence is derived from the
    /// timeout (`250ms + timeout/3`); set it for tight eviction bounds in
    /// tests or latency-sensitive callers.
    pub sweep_interval_override: Option<Duration>,
    /// Publish an untracked `rpc.cancel` request when a caller cancels.
    /// Off by default: with no such channel the remote side never learns
    /// about local cancellations.
    pub notify_remote_cancel: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            sweep_interval_override: None,
            notify_remote_cancel: false,
        }
    }
}

impl ClientConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Eviction sweep cadence: the explicit override if set, otherwise
    /// `250ms + timeout/3`, frequent enough relative to the timeout to
    /// bound worst-case detection slack.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval_override
            .unwrap_or_else(|| Duration::from_millis(250) + self.request_timeout / 3)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
