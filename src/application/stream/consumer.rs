//! Long-lived feed consumer with automatic reconnection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{parse_message, Backoff};
use crate::port::{FeedConnection, FeedConnector, MessageHandler};

/// Reconnection and validation settings for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// First reconnect delay, and the delay after every successful connection.
    pub base_delay: Duration,
    /// Upper bound on the reconnect delay.
    pub max_delay: Duration,
    /// Fields every message must carry to reach the handler.
    pub required_fields: Vec<String>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            required_fields: Vec::new(),
        }
    }
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub connections: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    connect_failures: AtomicU64,
    disconnects: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StreamStats {
        StreamStats {
            connections: self.connections.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Keeps one feed subscription alive for the owner's lifetime.
///
/// Connection and parse errors never escape: they are logged and the
/// consumer reconnects. Only [`stop`](Self::stop) ends the loop.
pub struct ReconnectingStreamConsumer {
    worker: Arc<Worker>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Worker {
    connector: Arc<dyn FeedConnector>,
    handler: Arc<dyn MessageHandler>,
    config: ReconnectConfig,
    running: AtomicBool,
    stats: Counters,
}

impl ReconnectingStreamConsumer {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        handler: Arc<dyn MessageHandler>,
        config: ReconnectConfig,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                connector,
                handler,
                config,
                running: AtomicBool::new(false),
                stats: Counters::default(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Spawn the reconnect loop. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.worker.running.swap(true, Ordering::SeqCst) {
            debug!(feed = self.worker.connector.feed_name(), "Consumer already running");
            return;
        }
        info!(feed = self.worker.connector.feed_name(), "Starting feed consumer");
        let worker = self.worker.clone();
        *self.task.lock() = Some(tokio::spawn(async move { worker.run().await }));
    }

    /// Stop the loop and wait for it to exit. No-op if not running.
    ///
    /// Once this returns the handler will not be invoked again, even if a
    /// message was being handled when `stop` was called.
    pub async fn stop(&self) {
        self.worker.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.task.lock().take() else {
            return;
        };
        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => error!(feed = self.worker.connector.feed_name(), error = %err, "Feed consumer task panicked"),
        }
        info!(feed = self.worker.connector.feed_name(), "Feed consumer stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stats(&self) -> StreamStats {
        self.worker.stats.snapshot()
    }

    #[must_use]
    pub fn feed_name(&self) -> &str {
        self.worker.connector.feed_name()
    }
}

impl Drop for ReconnectingStreamConsumer {
    fn drop(&mut self) {
        self.worker.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
            debug!(feed = self.worker.connector.feed_name(), "Feed consumer dropped, loop aborted");
        }
    }
}

impl Worker {
    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self) {
        let feed = self.connector.feed_name();
        let mut backoff = Backoff::new(self.config.base_delay, self.config.max_delay);

        while self.running() {
            let reason = match self.connector.connect().await {
                Ok(connection) => {
                    Counters::bump(&self.stats.connections);
                    backoff.reset();
                    info!(feed, "Feed connected");
                    let reason = self.pump(connection).await;
                    Counters::bump(&self.stats.disconnects);
                    reason
                }
                Err(err) => {
                    Counters::bump(&self.stats.connect_failures);
                    format!("connect failed: {err}")
                }
            };

            if !self.running() {
                break;
            }

            let delay = backoff.next_delay();
            warn!(
                feed,
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "Feed unavailable, reconnecting after delay"
            );
            sleep(delay).await;
        }
        debug!(feed, "Feed loop exited");
    }

    /// Dispatch frames until the connection ends; returns why it ended.
    async fn pump(&self, mut connection: Box<dyn FeedConnection>) -> String {
        let feed = self.connector.feed_name();
        while self.running() {
            match connection.next_frame().await {
                Some(Ok(text)) => match parse_message(&text, &self.config.required_fields) {
                    Ok(message) => {
                        self.handler.handle(message).await;
                        Counters::bump(&self.stats.delivered);
                    }
                    Err(err) => {
                        Counters::bump(&self.stats.dropped);
                        warn!(feed, error = %err, "Dropping malformed message");
                    }
                },
                Some(Err(err)) => return format!("connection error: {err}"),
                None => return "connection closed".to_string(),
            }
        }
        "consumer stopping".to_string()
    }
}
