//! Infrastructure: configuration, logging and wiring.

pub mod bootstrap;
pub mod config;
