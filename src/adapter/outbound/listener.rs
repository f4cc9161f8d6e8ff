//! Breaker listener that turns breaker events into log lines.

use tracing::{debug, info, warn};

use crate::domain::{BreakerState, ErrorKind};
use crate::port::BreakerListener;

/// Logs breaker transitions at info/warn and call outcomes at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl BreakerListener for TracingListener {
    fn on_state_change(&self, breaker: &str, from: BreakerState, to: BreakerState) {
        match to {
            BreakerState::Open => warn!(dependency = breaker, %from, %to, "Circuit breaker opened"),
            BreakerState::HalfOpen => info!(dependency = breaker, %from, %to, "Circuit breaker trial call"),
            BreakerState::Closed => info!(dependency = breaker, %from, %to, "Circuit breaker closed"),
        }
    }

    fn on_failure(&self, breaker: &str, kind: ErrorKind) {
        debug!(dependency = breaker, error_kind = %kind, "Dependency call failed");
    }

    fn on_success(&self, breaker: &str) {
        debug!(dependency = breaker, "Dependency call succeeded");
    }
}
