//! Capped exponential backoff for reconnect attempts.

use std::time::Duration;

/// Doubling delay, capped at `max`, reset to `base` on demand. No jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Delay to use now; the following call returns double, up to `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to `base` after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }
}
