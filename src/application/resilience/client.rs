//! Breaker-plus-retry composition used for every outbound peer call.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use super::{CircuitBreaker, RetryPolicy};
use crate::error::{CircuitOpenError, Classify};

/// Protected access to one named dependency.
///
/// Calls run as `breaker.call(|| retry.execute(op))`: retries happen inside
/// a single breaker admission, so a retried call is one breaker outcome.
#[derive(Debug, Clone)]
pub struct DependencyClient {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl DependencyClient {
    #[must_use]
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        Self { breaker, retry }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `operation` under this dependency's breaker and retry policy.
    ///
    /// Callers see either the operation's own error (after retries) or a
    /// circuit-open error. The latter means "try later", not "retry now".
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display + From<CircuitOpenError>,
    {
        let span = tracing::debug_span!("dependency", name = %self.name());
        self.breaker
            .call(|| self.retry.execute(operation))
            .instrument(span)
            .await
    }
}
