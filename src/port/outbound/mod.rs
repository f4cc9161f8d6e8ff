//! Ports implemented by adapters to reach external systems.

mod feed;
mod listener;

pub use feed::{FeedConnection, FeedConnector};
pub use listener::BreakerListener;
