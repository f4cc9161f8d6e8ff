//! Circuit breaker for peer dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single trial call decides the next state
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count reaches failure_threshold
//! Open → Half-Open: first call after reset_timeout (the trial)
//! Half-Open → Closed: trial succeeds
//! Half-Open → Open: trial fails (opened_at restarts)
//! ```
//!
//! Calls arriving while the trial is in flight are rejected. A trial whose
//! future is dropped before completing puts the breaker back to Open with
//! its original `opened_at`, so the next caller becomes the new trial.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{BreakerState, ErrorKind};
use crate::error::{CircuitOpenError, Classify};
use crate::port::BreakerListener;

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Time spent open before a trial call is allowed.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a breaker, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Listener notification, collected under the lock and delivered after it.
enum Event {
    StateChange(BreakerState, BreakerState),
    Success,
    Failure(ErrorKind),
}

/// Guards one named downstream dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    listeners: RwLock<Vec<Arc<dyn BreakerListener>>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: BreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener at construction time.
    #[must_use]
    pub fn with_listener(self, listener: Arc<dyn BreakerListener>) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn BreakerListener>) {
        self.listeners.write().push(listener);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn config(&self) -> BreakerConfig {
        self.config
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    #[must_use]
    pub fn opened_at(&self) -> Option<Instant> {
        self.inner.lock().opened_at
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            opened_at: inner.opened_at,
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// While open, returns [`CircuitOpenError`] (converted into `E`) without
    /// invoking `operation`. Otherwise the operation's result is returned
    /// as-is and its outcome is recorded.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + From<CircuitOpenError>,
    {
        let admission = self.admit().map_err(E::from)?;
        let mut trial = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = operation().await;
        trial.armed = false;

        match &result {
            Ok(_) => self.record_success(admission),
            Err(err) => self.record_failure(admission, err.kind()),
        }
        result
    }

    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut events = Vec::new();
        let admission = {
            let mut inner = self.inner.lock();
            match inner.state {
                BreakerState::Closed => Ok(Admission::Normal),
                BreakerState::HalfOpen => Err(self.rejection()),
                BreakerState::Open => {
                    let cooled = inner
                        .opened_at
                        .map_or(true, |at| at.elapsed() >= self.config.reset_timeout);
                    if cooled {
                        inner.state = BreakerState::HalfOpen;
                        events.push(Event::StateChange(BreakerState::Open, BreakerState::HalfOpen));
                        Ok(Admission::Trial)
                    } else {
                        Err(self.rejection())
                    }
                }
            }
        };
        self.emit(events);
        admission
    }

    fn rejection(&self) -> CircuitOpenError {
        debug!(dependency = %self.name, "Circuit open, rejecting call");
        CircuitOpenError {
            dependency: self.name.clone(),
        }
    }

    fn record_success(&self, admission: Admission) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            match (admission, inner.state) {
                (Admission::Trial, BreakerState::HalfOpen) => {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.opened_at = None;
                    events.push(Event::StateChange(BreakerState::HalfOpen, BreakerState::Closed));
                }
                (_, BreakerState::Closed) => inner.failure_count = 0,
                _ => {}
            }
        }
        events.push(Event::Success);
        self.emit(events);
    }

    fn record_failure(&self, admission: Admission, kind: ErrorKind) {
        let mut events = vec![Event::Failure(kind)];
        {
            let mut inner = self.inner.lock();
            match (admission, inner.state) {
                (Admission::Trial, BreakerState::HalfOpen) => {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    events.push(Event::StateChange(BreakerState::HalfOpen, BreakerState::Open));
                }
                (_, BreakerState::Closed) => {
                    inner.failure_count += 1;
                    if inner.failure_count >= self.config.failure_threshold {
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        events.push(Event::StateChange(BreakerState::Closed, BreakerState::Open));
                    }
                }
                _ => {}
            }
        }
        self.emit(events);
    }

    fn abandon_trial(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state == BreakerState::HalfOpen {
                inner.state = BreakerState::Open;
                events.push(Event::StateChange(BreakerState::HalfOpen, BreakerState::Open));
            }
        }
        if !events.is_empty() {
            debug!(dependency = %self.name, "Trial call cancelled, breaker back to open");
        }
        self.emit(events);
    }

    fn emit(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read();
        for event in events {
            for listener in listeners.iter() {
                match event {
                    Event::StateChange(from, to) => listener.on_state_change(&self.name, from, to),
                    Event::Success => listener.on_success(&self.name),
                    Event::Failure(kind) => listener.on_failure(&self.name, kind),
                }
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

/// Reverts a half-open breaker if the trial future is dropped mid-call.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::Error;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "signals",
            BreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_secs(10),
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), Error> {
        breaker
            .call(|| async { Err(Error::transient("signals", "refused")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), Error> {
        breaker.call(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = breaker(3);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.failure_count(), 2);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reports_counts_and_open_time() {
        let breaker = breaker(2);
        let _ = fail(&breaker).await;
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.name, "signals");
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!((snapshot.failure_count, snapshot.failure_threshold), (1, 2));
        assert_eq!(snapshot.opened_at, None);

        let _ = fail(&breaker).await;
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, BreakerState::Open);
        assert_eq!(snapshot.opened_at, Some(Instant::now()));
    }

    #[tokio::test]
    async fn zero_threshold_is_raised_to_one() {
        let breaker = breaker(0);
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_while_trial_in_flight() {
        let breaker = Arc::new(breaker(1));
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = release_rx.await;
                        Ok::<_, Error>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let calls = &AtomicU32::new(0);
        let rejected = breaker
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(rejected, Err(Error::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_reopens_breaker() {
        let breaker = breaker(1);
        let _ = fail(&breaker).await;
        let opened_at = breaker.opened_at();
        tokio::time::advance(Duration::from_secs(10)).await;

        let pending = breaker.call(|| std::future::pending::<Result<(), Error>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(5), pending).await;
        assert!(timed_out.is_err());

        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.opened_at(), opened_at);
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
