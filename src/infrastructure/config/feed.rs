//! Push feed configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::stream::ReconnectConfig;
use crate::error::{ConfigError, Result};

/// One `[feeds.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Initial reconnect delay (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Reconnect delay cap (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Fields a message must carry to be delivered.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Payload sent after every connect.
    #[serde(default)]
    pub subscribe: Option<serde_json::Value>,
    /// Deadline for the TCP, TLS and WebSocket handshake (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_max_delay_ms() -> u64 {
    60000 // 60 seconds
}

fn default_connect_timeout_ms() -> u64 {
    10000 // 10 seconds
}

impl FeedConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            required_fields: self.required_fields.clone(),
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        let invalid = |field: &str, reason: String| ConfigError::InvalidValue {
            field: format!("feeds.{name}.{field}"),
            reason,
        };

        let url = url::Url::parse(&self.url).map_err(|err| invalid("url", err.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid("url", format!("unsupported scheme '{}'", url.scheme())).into());
        }
        if self.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms", "must be greater than 0".into()).into());
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be greater than 0".into()).into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid("max_delay_ms", "must be >= base_delay_ms".into()).into());
        }
        Ok(())
    }
}
