//! Circuit breaker state machine and breaker-plus-retry composition.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bulwark::application::resilience::{CircuitBreaker, DependencyClient, RetryPolicy};
use bulwark::domain::{BreakerState, ErrorKind};
use bulwark::error::Error;
use bulwark::testkit::config::breaker;
use bulwark::testkit::listener::{BreakerEvent, RecordingListener};

const RESET: Duration = Duration::from_secs(30);

async fn fail(breaker: &CircuitBreaker) -> Result<(), Error> {
    breaker
        .call(|| async { Err(Error::transient("signals", "connection refused")) })
        .await
}

#[tokio::test]
async fn opens_exactly_on_threshold() {
    let breaker = CircuitBreaker::new("signals", breaker(3, RESET));

    for expected in 1..3 {
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), expected);
    }

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.opened_at().is_some());
}

#[tokio::test(start_paused = true)]
async fn open_breaker_rejects_without_calling() {
    let breaker = CircuitBreaker::new("market-data", breaker(1, RESET));
    let _ = fail(&breaker).await;

    tokio::time::advance(RESET - Duration::from_millis(1)).await;

    let calls = &AtomicU32::new(0);
    let result: Result<(), Error> = breaker
        .call(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::CircuitOpen(ref e)) if e.dependency == "market-data"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_with_fresh_timestamp() {
    let breaker = CircuitBreaker::new("workspace", breaker(2, RESET));
    let _ = fail(&breaker).await;
    let _ = fail(&breaker).await;
    let first_open = breaker.opened_at().unwrap();

    tokio::time::advance(RESET).await;
    let _ = fail(&breaker).await;

    assert_eq!(breaker.state(), BreakerState::Open);
    let reopened = breaker.opened_at().unwrap();
    assert!(reopened > first_open);
    assert_eq!(reopened - first_open, RESET);

    // The reset timeout restarts from the failed trial.
    tokio::time::advance(RESET / 2).await;
    assert!(matches!(fail(&breaker).await, Err(Error::CircuitOpen(_))));
}

#[tokio::test(start_paused = true)]
async fn successful_trial_closes_and_clears_count() {
    let breaker = CircuitBreaker::new("docs", breaker(2, RESET));
    let _ = fail(&breaker).await;
    let _ = fail(&breaker).await;

    tokio::time::advance(RESET).await;
    let value: Result<u8, Error> = breaker.call(|| async { Ok(42) }).await;

    assert_eq!(value.unwrap(), 42);
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert_eq!(breaker.failure_count(), 0);
    assert!(breaker.opened_at().is_none());
}

#[tokio::test(start_paused = true)]
async fn listeners_observe_full_cycle() {
    let listener = Arc::new(RecordingListener::new());
    let breaker = CircuitBreaker::new("risk-engine", breaker(1, RESET)).with_listener(listener.clone());

    let _ = fail(&breaker).await;
    tokio::time::advance(RESET).await;
    let _: Result<(), Error> = breaker.call(|| async { Ok(()) }).await;

    assert_eq!(
        listener.transitions(),
        vec![
            (BreakerState::Closed, BreakerState::Open),
            (BreakerState::Open, BreakerState::HalfOpen),
            (BreakerState::HalfOpen, BreakerState::Closed),
        ]
    );
    assert_eq!(listener.failures(), 1);
    assert_eq!(listener.successes(), 1);
    assert!(listener.events().contains(&BreakerEvent::Failure {
        breaker: "risk-engine".into(),
        kind: ErrorKind::Transient,
    }));
}

#[tokio::test]
async fn permanent_errors_also_count_as_failures() {
    let breaker = CircuitBreaker::new("docs", breaker(2, RESET));
    for _ in 0..2 {
        let _: Result<(), Error> = breaker
            .call(|| async { Err(Error::permanent("docs", Some(400), "bad request")) })
            .await;
    }
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn retried_call_is_one_breaker_failure() {
    let breaker = Arc::new(CircuitBreaker::new("scrape-proxy", breaker(2, RESET)));
    let client = DependencyClient::new(
        breaker.clone(),
        RetryPolicy::new(3, vec![Duration::from_millis(10)]),
    );

    let attempts = &AtomicU32::new(0);
    let result: Result<(), Error> = client
        .call(move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::transient("scrape-proxy", "timeout"))
        })
        .await;

    assert!(matches!(result, Err(Error::Transient { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.failure_count(), 1);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn open_breaker_short_circuits_retries() {
    let breaker = Arc::new(CircuitBreaker::new("signals", breaker(1, RESET)));
    let client = DependencyClient::new(breaker.clone(), RetryPolicy::new(3, vec![Duration::from_millis(10)]));

    let attempts = &AtomicU32::new(0);
    let failing = move || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(Error::transient("signals", "refused"))
    };

    let _ = client.call(failing).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let second = client.call(failing).await;
    assert!(matches!(second, Err(Error::CircuitOpen(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 3, "open breaker must not invoke the operation");
}
