//! Self-healing push feed consumption.
//!
//! ```text
//! Stopped ──start()──▶ Running
//!                        │
//!              ┌─────────┴──────────┐
//!              ▼                    │
//!          Connected ──close/err──▶ Reconnecting (sleep backoff, double)
//!              ▲                    │
//!              └──────connect ok────┘ (backoff reset)
//!
//! Running ──stop()──▶ Stopped (task aborted and awaited)
//! ```

mod backoff;
mod consumer;
mod parse;

pub use backoff::Backoff;
pub use consumer::{ReconnectConfig, ReconnectingStreamConsumer, StreamStats};
pub use parse::parse_message;
