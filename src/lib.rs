//! Bulwark - resilience and GPU arbitration for a fleet of cooperating
//! services.
//!
//! # Architecture
//!
//! The crate follows a ports-and-adapters layout:
//!
//! - **`application::resilience`** - Protecting outbound peer calls
//!   - `RetryPolicy` - bounded attempts with a per-attempt delay table
//!   - `CircuitBreaker` - closed/open/half-open gate with listeners
//!   - `DependencyClient` - `breaker.call(|| retry.execute(op))`
//!   - `DependencyRegistry` - one client per named dependency
//!
//! - **`application::gpu`** - Serializing access to a shared GPU
//!   - `GpuArbiter` - in-process semaphore plus an optional mkdir-based
//!     cross-process lock, cooldown and wait telemetry
//!
//! - **`application::stream`** - Long-lived push feed consumption
//!   - `ReconnectingStreamConsumer` - capped exponential backoff,
//!     malformed-message skipping, cancellable stop
//!
//! # Modules
//!
//! - [`domain`] - Runtime-agnostic types: breaker state, error kinds, lock owner
//! - [`port`] - Traits at the seams: feed transport, message handler, breaker listener
//! - [`application`] - The resilience, GPU and stream components
//! - [`adapter`] - reqwest peer client, WebSocket connector, tracing listener, CLI
//! - [`infrastructure`] - TOML configuration, logging and wiring
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Scripted feed connectors and recording listeners for tests
//!
//! # Example
//!
//! ```no_run
//! use bulwark::application::resilience::DependencyRegistry;
//! use bulwark::domain::Peer;
//! use bulwark::error::Error;
//!
//! # async fn demo() -> Result<(), Error> {
//! let registry = DependencyRegistry::default();
//! let signals = registry.client(Peer::Signals.name());
//! let score: f64 = signals.call(|| async { Ok::<_, Error>(0.9) }).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
