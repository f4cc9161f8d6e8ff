//! Push feed transport port.
//!
//! Split in two so the consumer can open a fresh connection per attempt
//! while the connector itself (URL, subscription payload) lives for the
//! consumer's lifetime.

use async_trait::async_trait;

use crate::error::Result;

/// Opens connections to one push feed.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a new connection, including any subscription handshake.
    async fn connect(&self) -> Result<Box<dyn FeedConnection>>;

    /// Feed name used in log lines.
    fn feed_name(&self) -> &str;
}

/// One live connection to a push feed.
#[async_trait]
pub trait FeedConnection: Send {
    /// Next text frame.
    ///
    /// Returns `Some(Err(_))` on a transport failure and `None` once the
    /// connection has closed. Either ends the connection.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}
