//! Application configuration loading and validation.
//!
//! [`Config`] aggregates the logging, peer and feed sections of a TOML file.
//! Peer base URLs can be overridden from the environment so one file serves
//! several deployments. GPU arbitration is configured separately from
//! `BULWARK_GPU_*` variables (see [`GpuPolicy::from_env`]).
//!
//! # Example
//!
//! ```no_run
//! use bulwark::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("bulwark.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```
//!
//! [`GpuPolicy::from_env`]: crate::application::gpu::GpuPolicy::from_env

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::feed::FeedConfig;
use super::logging::LoggingConfig;
use super::peer::PeerConfig;
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Peer services, keyed by dependency name.
    #[serde(default)]
    pub peers: BTreeMap<String, PeerConfig>,

    /// Push feeds, keyed by feed name.
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedConfig>,
}

impl Config {
    /// Parse configuration from TOML content, applying environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        Self::parse_toml_with(content, |key| std::env::var(key).ok())
    }

    /// Like [`parse_toml`](Self::parse_toml) with an explicit environment
    /// lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, peer) in &mut self.peers {
            if let Some(url) = lookup(&PeerConfig::url_override_var(name)) {
                if !url.trim().is_empty() {
                    peer.base_url = url;
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.logging.is_known_format() {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".into(),
                reason: format!("expected 'pretty' or 'json', got '{}'", self.logging.format),
            }
            .into());
        }
        for (name, peer) in &self.peers {
            peer.validate(name)?;
        }
        for (name, feed) in &self.feeds {
            feed.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const SAMPLE: &str = r#"
        [logging]
        level = "debug"
        format = "json"

        [peers.risk-engine]
        base_url = "http://localhost:8081/"
        failure_threshold = 3
        retry_delays_ms = [100, 200, 400]

        [peers.docs]
        base_url = "http://localhost:8090/api/"
        health_path = "status"

        [feeds.market-data]
        url = "wss://feeds.local/ws"
        base_delay_ms = 500
        required_fields = ["type", "symbol"]
        subscribe = { op = "subscribe", channel = "ticks" }
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_full_file() {
        let config = Config::parse_toml_with(SAMPLE, no_env).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.peers.len(), 2);

        let risk = &config.peers["risk-engine"];
        assert_eq!(risk.failure_threshold, 3);
        assert_eq!(risk.max_attempts, 3);
        assert_eq!(risk.health_path, "health");
        assert_eq!(config.peers["docs"].health_path, "status");

        let feed = &config.feeds["market-data"];
        let reconnect = feed.reconnect();
        assert_eq!(reconnect.base_delay, Duration::from_millis(500));
        assert_eq!(reconnect.max_delay, Duration::from_secs(60));
        assert_eq!(reconnect.required_fields, vec!["type", "symbol"]);
        assert_eq!(feed.subscribe.as_ref().unwrap()["channel"], "ticks");
        assert_eq!(feed.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_connect_timeout() {
        let toml = r#"
            [feeds.ticks]
            url = "ws://localhost:9001/"
            connect_timeout_ms = 0
        "#;
        let err = Config::parse_toml_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("feeds.ticks.connect_timeout_ms"));
    }

    #[test]
    fn empty_file_is_valid() {
        let config = Config::parse_toml_with("", no_env).unwrap();
        assert!(config.peers.is_empty());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn environment_overrides_base_url() {
        let config = Config::parse_toml_with(SAMPLE, |key| {
            (key == "BULWARK_PEER_RISK_ENGINE_URL").then(|| "http://risk.internal/".to_string())
        })
        .unwrap();
        assert_eq!(config.peers["risk-engine"].base_url, "http://risk.internal/");
        assert_eq!(config.peers["docs"].base_url, "http://localhost:8090/api/");
    }

    #[test]
    fn rejects_zero_threshold() {
        let toml = r#"
            [peers.signals]
            base_url = "http://localhost:9000/"
            failure_threshold = 0
        "#;
        let err = Config::parse_toml_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("peers.signals.failure_threshold"));
    }

    #[test]
    fn rejects_inverted_feed_delays() {
        let toml = r#"
            [feeds.ticks]
            url = "ws://localhost:9001"
            base_delay_ms = 5000
            max_delay_ms = 1000
        "#;
        let err = Config::parse_toml_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("feeds.ticks.max_delay_ms"));
    }

    #[test]
    fn rejects_http_feed_url() {
        let toml = r#"
            [feeds.ticks]
            url = "http://localhost:9001"
        "#;
        assert!(Config::parse_toml_with(toml, no_env).is_err());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let toml = r#"
            [logging]
            format = "xml"
        "#;
        assert!(Config::parse_toml_with(toml, no_env).is_err());
    }
}
