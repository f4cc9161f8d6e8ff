//! Ports driven by the components in this crate.

mod handler;

pub use handler::{JsonObject, MessageHandler};
