//! Recording [`BreakerListener`] for assertions on breaker events.

use parking_lot::Mutex;

use crate::domain::{BreakerState, ErrorKind};
use crate::port::BreakerListener;

/// One observed breaker event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerEvent {
    StateChange {
        breaker: String,
        from: BreakerState,
        to: BreakerState,
    },
    Failure {
        breaker: String,
        kind: ErrorKind,
    },
    Success {
        breaker: String,
    },
}

/// Stores every event it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<BreakerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events.lock().clone()
    }

    /// Only the `(from, to)` pairs of state changes.
    pub fn transitions(&self) -> Vec<(BreakerState, BreakerState)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BreakerEvent::StateChange { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.count(|e| matches!(e, BreakerEvent::Failure { .. }))
    }

    pub fn successes(&self) -> usize {
        self.count(|e| matches!(e, BreakerEvent::Success { .. }))
    }

    fn count(&self, pred: impl Fn(&BreakerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl BreakerListener for RecordingListener {
    fn on_state_change(&self, breaker: &str, from: BreakerState, to: BreakerState) {
        self.events.lock().push(BreakerEvent::StateChange {
            breaker: breaker.to_string(),
            from,
            to,
        });
    }

    fn on_failure(&self, breaker: &str, kind: ErrorKind) {
        self.events.lock().push(BreakerEvent::Failure {
            breaker: breaker.to_string(),
            kind,
        });
    }

    fn on_success(&self, breaker: &str) {
        self.events.lock().push(BreakerEvent::Success {
            breaker: breaker.to_string(),
        });
    }
}
