//! Circuit breaker observability port.

use crate::domain::{BreakerState, ErrorKind};

/// Hooks invoked synchronously by a
/// [`CircuitBreaker`](crate::application::resilience::CircuitBreaker).
///
/// Implementations are log or metric emitters and must return quickly.
/// They are called after the breaker's internal lock is released, so they
/// may read breaker state.
pub trait BreakerListener: Send + Sync {
    fn on_state_change(&self, _breaker: &str, _from: BreakerState, _to: BreakerState) {}

    fn on_failure(&self, _breaker: &str, _kind: ErrorKind) {}

    fn on_success(&self, _breaker: &str) {}
}
