//! Per-dependency client registry.
//!
//! Built once by startup code and handed to whatever needs outbound
//! access. Every name maps to its own breaker, so one failing peer never
//! trips another.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::{BreakerConfig, CircuitBreaker, DependencyClient, RetryPolicy};
use crate::port::BreakerListener;

/// Breaker and retry settings for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySettings {
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
}

/// Dependency name to [`DependencyClient`] map.
pub struct DependencyRegistry {
    defaults: DependencySettings,
    overrides: HashMap<String, DependencySettings>,
    listeners: Vec<Arc<dyn BreakerListener>>,
    clients: DashMap<String, Arc<DependencyClient>>,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new(defaults: DependencySettings) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            listeners: Vec::new(),
            clients: DashMap::new(),
        }
    }

    /// Use `settings` instead of the defaults for `name`.
    #[must_use]
    pub fn with_settings(mut self, name: impl Into<String>, settings: DependencySettings) -> Self {
        self.overrides.insert(name.into(), settings);
        self
    }

    /// Attach `listener` to every breaker this registry creates.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Client for `name`, created on first use.
    pub fn client(&self, name: &str) -> Arc<DependencyClient> {
        if let Some(client) = self.clients.get(name) {
            return client.clone();
        }
        self.clients
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(self.build(name)))
            .clone()
    }

    /// Names with configured settings or an already-created client, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .overrides
            .keys()
            .cloned()
            .chain(self.clients.iter().map(|entry| entry.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn build(&self, name: &str) -> DependencyClient {
        let settings = self.overrides.get(name).unwrap_or(&self.defaults);
        let breaker = CircuitBreaker::new(name, settings.breaker);
        for listener in &self.listeners {
            breaker.add_listener(listener.clone());
        }
        DependencyClient::new(Arc::new(breaker), settings.retry.clone())
    }
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new(DependencySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{BreakerState, Peer};
    use crate::error::Error;

    fn one_strike() -> DependencySettings {
        DependencySettings {
            breaker: BreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_secs(60),
            },
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn same_name_returns_same_client() {
        let registry = DependencyRegistry::default();
        let a = registry.client(Peer::Signals.name());
        let b = registry.client(Peer::Signals.name());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn overrides_apply_per_name() {
        let registry = DependencyRegistry::default().with_settings("docs", one_strike());
        assert_eq!(registry.client("docs").breaker().config().failure_threshold, 1);
        assert_eq!(
            registry.client("workspace").breaker().config().failure_threshold,
            BreakerConfig::default().failure_threshold
        );
        assert_eq!(registry.names(), vec!["docs".to_string(), "workspace".to_string()]);
    }

    #[tokio::test]
    async fn peers_are_isolated() {
        let registry = DependencyRegistry::new(one_strike());
        let risk = registry.client(Peer::RiskEngine.name());
        let market = registry.client(Peer::MarketData.name());

        let _: Result<(), Error> = risk
            .call(|| async { Err(Error::transient("risk-engine", "refused")) })
            .await;

        assert_eq!(risk.breaker().state(), BreakerState::Open);
        assert_eq!(market.breaker().state(), BreakerState::Closed);
        let ok: Result<u8, Error> = market.call(|| async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
