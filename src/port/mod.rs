//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Available Ports
//!
//! - [`FeedConnector`], [`FeedConnection`] - push feed transport used by the
//!   reconnecting stream consumer
//! - [`BreakerListener`] - circuit breaker observability hooks
//! - [`MessageHandler`] - caller-supplied sink for parsed feed messages

pub mod inbound;
pub mod outbound;

pub use inbound::{JsonObject, MessageHandler};
pub use outbound::{BreakerListener, FeedConnection, FeedConnector};
