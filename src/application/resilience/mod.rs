//! Resilience primitives for outbound calls.
//!
//! # Data Flow
//! ```text
//! Outbound call to peer:
//!     → DependencyClient (one per peer name)
//!         → CircuitBreaker::call (fail fast while open, one outcome per call)
//!             → RetryPolicy::execute (transient errors only, scheduled delays)
//!                 → raw call
//! ```
//!
//! Retries sit inside the breaker so a retried call counts as a single
//! breaker-visible failure, not one per attempt.

mod breaker;
mod client;
mod registry;
mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker};
pub use client::DependencyClient;
pub use registry::{DependencyRegistry, DependencySettings};
pub use retry::RetryPolicy;
