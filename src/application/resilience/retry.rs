//! Bounded retry of a single async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Classify;

/// Retry policy with a fixed per-attempt delay schedule.
///
/// The delay after failed attempt `i` (1-indexed) is
/// `delays[min(i - 1, delays.len() - 1)]`, so a schedule shorter than the
/// attempt budget keeps repeating its last entry. An empty schedule retries
/// immediately.
///
/// The policy holds no per-call state and can be shared freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` total attempts (at least one).
    #[must_use]
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Vec::new())
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let index = (attempt.saturating_sub(1) as usize).min(self.delays.len() - 1);
        self.delays[index]
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// Non-retryable errors are returned straight away. When the attempt
    /// budget runs out the last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let kind = err.kind();
            if !kind.is_retryable() {
                debug!(attempt, error_kind = %kind, error = %err, "Not retrying");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    error_kind = %kind,
                    error = %err,
                    "Retry attempts exhausted"
                );
                return Err(err);
            }

            let delay = self.delay_after(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error_kind = %kind,
                error = %err,
                "Transient failure, retrying after delay"
            );
            if !delay.is_zero() {
                sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self::new(3, vec![Duration::from_secs(1), Duration::from_secs(2)])
    }
}
