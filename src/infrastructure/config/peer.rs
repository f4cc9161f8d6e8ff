//! Peer service configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::resilience::{BreakerConfig, DependencySettings, RetryPolicy};
use crate::error::{ConfigError, Result};

/// One `[peers.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    /// Root URL requests are joined onto.
    pub base_url: String,
    /// Path probed by `bulwark check`, relative to `base_url`.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Per-request timeout (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consecutive failed calls that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before a trial call.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before each retry (milliseconds); the last entry repeats.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
}

fn default_health_path() -> String {
    "health".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![1000, 2000]
}

impl PeerConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            health_path: default_health_path(),
            timeout_ms: default_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delays_ms: default_retry_delays_ms(),
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Breaker and retry settings for this peer.
    #[must_use]
    pub fn settings(&self) -> DependencySettings {
        DependencySettings {
            breaker: BreakerConfig {
                failure_threshold: self.failure_threshold,
                reset_timeout: Duration::from_secs(self.reset_timeout_secs),
            },
            retry: RetryPolicy::new(
                self.max_attempts,
                self.retry_delays_ms.iter().copied().map(Duration::from_millis).collect(),
            ),
        }
    }

    /// Environment variable that overrides `base_url` for peer `name`.
    #[must_use]
    pub fn url_override_var(name: &str) -> String {
        format!("BULWARK_PEER_{}_URL", name.to_uppercase().replace('-', "_"))
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: format!("peers.{name}.{field}"),
            reason: reason.to_string(),
        };

        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty").into());
        }
        if let Err(err) = url::Url::parse(&self.base_url) {
            return Err(invalid("base_url", &err.to_string()).into());
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be greater than 0").into());
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure_threshold", "must be greater than 0").into());
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than 0").into());
        }
        Ok(())
    }
}
