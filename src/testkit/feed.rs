//! Mock feed transports and message handlers for testing.
//!
//! - [`ScriptedConnector`]: Pre-loaded connect outcomes and per-connection
//!   frames. Best for: backoff timing, reconnection, malformed frames.
//!
//! - [`ChannelConnector`]: Frames pushed on demand through a
//!   [`ChannelFeedHandle`]. Best for: stop/ordering tests that need a
//!   message to arrive at a precise moment.
//!
//! - [`RecordingHandler`]: Collects delivered messages, optionally after a
//!   per-message delay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::port::{FeedConnection, FeedConnector, JsonObject, MessageHandler};

// ---------------------------------------------------------------------------
// ScriptedConnector
// ---------------------------------------------------------------------------

enum Script {
    Fail(String),
    Session { frames: Vec<Result<String>>, close: bool },
}

/// A connector that replays a fixed script of connection outcomes.
///
/// Each `connect()` pops the next entry. Once the script is exhausted every
/// further `connect()` fails.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    connect_count: Arc<AtomicU32>,
    connect_times: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            connect_count: Arc::new(AtomicU32::new(0)),
            connect_times: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Next `connect()` fails with a connection error.
    pub fn with_failure(self, reason: impl Into<String>) -> Self {
        self.script.lock().push_back(Script::Fail(reason.into()));
        self
    }

    /// Next `connect()` yields `frames`, then the connection stays open and
    /// silent.
    pub fn with_session(self, frames: Vec<Result<String>>) -> Self {
        self.script.lock().push_back(Script::Session {
            frames,
            close: false,
        });
        self
    }

    /// Next `connect()` yields `frames`, then the server closes.
    pub fn with_closing_session(self, frames: Vec<Result<String>>) -> Self {
        self.script.lock().push_back(Script::Session {
            frames,
            close: true,
        });
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Instants at which `connect()` was called, in order.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connect_times.lock().clone()
    }

    /// Gaps between consecutive `connect()` calls.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        self.connect_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_times.lock().push(Instant::now());

        match self.script.lock().pop_front() {
            Some(Script::Session { frames, close }) => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                close,
            })),
            Some(Script::Fail(reason)) => Err(Error::Connection(reason)),
            None => Err(Error::Connection("script exhausted".into())),
        }
    }

    fn feed_name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedConnection {
    frames: VecDeque<Result<String>>,
    close: bool,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(frame);
        }
        if self.close {
            return None;
        }
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// ChannelConnector
// ---------------------------------------------------------------------------

/// A connector whose single connection is fed through a channel.
///
/// Only the first `connect()` succeeds; later ones fail, so a closed
/// channel shows up as a reconnect loop.
pub struct ChannelConnector {
    frames: Mutex<Option<mpsc::Receiver<Option<String>>>>,
    connect_count: Arc<AtomicU32>,
}

/// Control handle for a [`ChannelConnector`].
pub struct ChannelFeedHandle {
    frame_tx: mpsc::Sender<Option<String>>,
    connect_count: Arc<AtomicU32>,
}

impl ChannelFeedHandle {
    /// Push a text frame to the connection.
    pub async fn send(&self, frame: impl Into<String>) {
        let _ = self.frame_tx.send(Some(frame.into())).await;
    }

    /// Close the connection from the server side.
    pub async fn close(&self) {
        let _ = self.frame_tx.send(None).await;
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }
}

/// Create a [`ChannelConnector`] and its control [`ChannelFeedHandle`].
pub fn channel_feed(buffer: usize) -> (ChannelConnector, ChannelFeedHandle) {
    let (tx, rx) = mpsc::channel(buffer);
    let count = Arc::new(AtomicU32::new(0));
    (
        ChannelConnector {
            frames: Mutex::new(Some(rx)),
            connect_count: count.clone(),
        },
        ChannelFeedHandle {
            frame_tx: tx,
            connect_count: count,
        },
    )
}

#[async_trait]
impl FeedConnector for ChannelConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        match self.frames.lock().take() {
            Some(rx) => Ok(Box::new(ChannelConnection { rx })),
            None => Err(Error::Connection("channel feed already consumed".into())),
        }
    }

    fn feed_name(&self) -> &str {
        "channel"
    }
}

struct ChannelConnection {
    rx: mpsc::Receiver<Option<String>>,
}

#[async_trait]
impl FeedConnection for ChannelConnection {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.rx.recv().await {
            Some(Some(frame)) => Some(Ok(frame)),
            Some(None) | None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingHandler
// ---------------------------------------------------------------------------

/// Records delivered messages.
///
/// With a delay, each message is recorded only after the delay elapses, so
/// a message whose handling is cancelled is never recorded.
#[derive(Default)]
pub struct RecordingHandler {
    delay: Duration,
    started: AtomicU32,
    messages: Mutex<Vec<JsonObject>>,
    notify: Notify,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that takes `delay` to process each message.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<JsonObject> {
        self.messages.lock().clone()
    }

    /// Invocations that began, including ones still in progress.
    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` messages were recorded.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.messages.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `count` invocations began.
    pub async fn wait_started(&self, count: u32) {
        loop {
            let notified = self.notify.notified();
            if self.started() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: JsonObject) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.messages.lock().push(message);
        self.notify.notify_waiters();
    }
}
