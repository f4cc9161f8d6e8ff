//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`feed`]: Mock [`FeedConnector`](crate::port::FeedConnector) and
//!   [`MessageHandler`](crate::port::MessageHandler) implementations.
//! - [`listener`]: A breaker listener that records every event.
//! - [`config`]: Canonical test configurations.

pub mod config;
pub mod feed;
pub mod listener;
