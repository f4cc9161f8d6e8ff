//! Message handler port for the stream consumer.

use async_trait::async_trait;

/// A parsed feed message.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Receives each well-formed message from a
/// [`ReconnectingStreamConsumer`](crate::application::stream::ReconnectingStreamConsumer).
///
/// Malformed frames are filtered out before this is reached. The handler
/// runs inside the consumer task, so a slow handler delays the next read
/// but never overlaps with itself.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: JsonObject);
}
