//! CLI module graph.

pub mod check;
pub mod command;
pub mod lock;
pub mod output;
pub mod policy;
pub mod watch;
