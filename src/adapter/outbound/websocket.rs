//! WebSocket feed connector.
//!
//! Opens a connection per [`FeedConnector::connect`] call, sends the
//! configured subscription payload, and exposes text frames to the
//! consumer. Reconnection is the consumer's job; a connection here ends on
//! the first close frame or transport error.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::port::{FeedConnection, FeedConnector};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for one WebSocket push feed.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    name: String,
    url: String,
    subscribe: Option<serde_json::Value>,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            subscribe: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Payload sent as a text frame right after each connect.
    #[must_use]
    pub fn with_subscription(mut self, payload: serde_json::Value) -> Self {
        self.subscribe = Some(payload);
        self
    }

    /// Deadline for the whole handshake; defaults to 10 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl FeedConnector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>> {
        debug!(feed = %self.name, url = %self.url, "Connecting to WebSocket");

        let (mut ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| {
                Error::Connection(format!("connect timed out after {:?}", self.connect_timeout))
            })??;
        info!(feed = %self.name, status = %response.status(), "WebSocket connected");

        if let Some(payload) = &self.subscribe {
            ws.send(Message::Text(payload.to_string())).await?;
            debug!(feed = %self.name, "Subscription sent");
        }

        Ok(Box::new(WebSocketConnection {
            feed: self.name.clone(),
            ws,
        }))
    }

    fn feed_name(&self) -> &str {
        &self.name
    }
}

struct WebSocketConnection {
    feed: String,
    ws: Socket,
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                // Binary frames go through the same parser; invalid UTF-8 is
                // rejected there as malformed JSON.
                Ok(Message::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                }
                Ok(Message::Ping(data)) => {
                    debug!(feed = %self.feed, "Received ping");
                    if let Err(err) = self.ws.send(Message::Pong(data)).await {
                        return Some(Err(err.into()));
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(feed = %self.feed, frame = ?frame, "WebSocket closed by server");
                    return None;
                }
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}
