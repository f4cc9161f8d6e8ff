//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapter::outbound::{HttpPeer, TracingListener, WebSocketConnector};
use crate::application::resilience::{DependencyRegistry, DependencySettings};
use crate::application::stream::ReconnectingStreamConsumer;
use crate::domain::Peer;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::Config;
use crate::port::MessageHandler;

/// Build the dependency registry: one breaker per configured peer, all
/// reporting through [`TracingListener`].
#[must_use]
pub fn build_registry(config: &Config) -> DependencyRegistry {
    let mut registry =
        DependencyRegistry::new(DependencySettings::default()).with_listener(Arc::new(TracingListener));
    for (name, peer) in &config.peers {
        if name.parse::<Peer>().is_err() {
            debug!(dependency = %name, "Configured peer is not a standard fleet service");
        }
        registry = registry.with_settings(name.clone(), peer.settings());
    }
    registry
}

/// Build an [`HttpPeer`] for every configured peer, sorted by name.
///
/// # Errors
///
/// Returns an error if a peer's HTTP client cannot be built.
pub fn build_peers(config: &Config, registry: &DependencyRegistry) -> Result<Vec<HttpPeer>> {
    config
        .peers
        .iter()
        .map(|(name, peer)| {
            HttpPeer::new(&peer.base_url, peer.timeout(), registry.client(name))
                .map(|client| client.with_health_path(peer.health_path.clone()))
        })
        .collect()
}

/// Build a (not yet started) consumer for the feed named `feed`.
///
/// # Errors
///
/// Returns [`ConfigError::Unknown`] if no such feed is configured.
pub fn build_consumer(
    config: &Config,
    feed: &str,
    handler: Arc<dyn MessageHandler>,
) -> Result<ReconnectingStreamConsumer> {
    let settings = config.feeds.get(feed).ok_or_else(|| ConfigError::Unknown {
        kind: "feed",
        name: feed.to_string(),
    })?;

    let mut connector =
        WebSocketConnector::new(feed, &settings.url).with_connect_timeout(settings.connect_timeout());
    if let Some(payload) = &settings.subscribe {
        connector = connector.with_subscription(payload.clone());
    }
    info!(feed, url = %settings.url, "Feed consumer configured");

    Ok(ReconnectingStreamConsumer::new(
        Arc::new(connector),
        handler,
        settings.reconnect(),
    ))
}
