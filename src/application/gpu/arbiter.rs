//! GPU slot arbiter and its scoped permit.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{GpuPolicy, LockToken, PolicySnapshot};
use crate::domain::LockOwner;
use crate::error::{Error, Result};

/// Serializes access to one GPU-bound runtime.
///
/// One instance per process, built at startup and shared by reference or
/// `Arc`. Acquisition blocks instead of failing; wrap it in a deadline with
/// [`GpuArbiter::acquire_timeout`] when a bound is needed.
///
/// # Example
///
/// ```no_run
/// use bulwark::application::gpu::{GpuArbiter, GpuPolicy};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let arbiter = GpuArbiter::new(GpuPolicy::from_env()?);
/// let answer = arbiter.run("chat", async { "generated text" }).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GpuArbiter {
    policy: Arc<GpuPolicy>,
    semaphore: Arc<Semaphore>,
    stats: Arc<Counters>,
}

impl GpuArbiter {
    #[must_use]
    pub fn new(policy: GpuPolicy) -> Self {
        let permits = policy.effective_concurrency().max(1);
        info!(
            concurrency = permits,
            cross_process_lock = policy.cross_process_enabled(),
            lock_path = %policy.lock_path.display(),
            cooldown_ms = policy.cooldown.as_millis() as u64,
            "GPU arbiter ready"
        );
        Self {
            policy: Arc::new(policy),
            semaphore: Arc::new(Semaphore::new(permits)),
            stats: Arc::new(Counters::default()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &GpuPolicy {
        &self.policy
    }

    /// Resolved policy for introspection endpoints.
    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        self.policy.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> ArbiterStats {
        self.stats.snapshot()
    }

    /// Wait for a GPU slot for `operation`.
    ///
    /// Takes the in-process semaphore first, then the cross-process lock
    /// when enabled. Cancelling the returned future releases whatever was
    /// already taken.
    pub async fn acquire(&self, operation: &str) -> GpuPermit {
        let start = Instant::now();
        let slot = Slot::take(&self.semaphore, &self.stats).await;
        let wait_time = start.elapsed();
        if wait_time >= self.policy.wait_log_threshold {
            info!(
                operation,
                wait_ms = wait_time.as_millis() as u64,
                "Waited for GPU slot"
            );
        }

        let owner = LockOwner::current(operation);
        let mut lock_wait = Duration::ZERO;
        let lock = if self.policy.cross_process_enabled() {
            let lock_start = Instant::now();
            let token = LockToken::acquire(
                &self.policy.lock_path,
                self.policy.lock_poll_interval,
                owner.clone(),
            )
            .await;
            lock_wait = lock_start.elapsed();
            if lock_wait >= self.policy.wait_log_threshold {
                info!(
                    operation,
                    wait_ms = lock_wait.as_millis() as u64,
                    lock = %self.policy.lock_path.display(),
                    "Waited for cross-process GPU lock"
                );
            }
            Some(token)
        } else {
            None
        };

        self.stats.record_wait(wait_time + lock_wait);
        debug!(operation, owner = %owner, "GPU slot acquired");

        GpuPermit {
            operation: operation.to_string(),
            owner,
            wait_time,
            lock_wait,
            policy: self.policy.clone(),
            lock,
            slot: Some(slot),
        }
    }

    /// [`GpuArbiter::acquire`] bounded by a caller deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockContentionTimeout`] if no slot was obtained
    /// within `deadline`. Nothing is held in that case.
    pub async fn acquire_timeout(&self, operation: &str, deadline: Duration) -> Result<GpuPermit> {
        tokio::time::timeout(deadline, self.acquire(operation))
            .await
            .map_err(|_| Error::LockContentionTimeout {
                lock_path: self.policy.lock_path.clone(),
                waited: deadline,
            })
    }

    /// Run `work` while holding a GPU slot, releasing it afterwards.
    ///
    /// The slot is also released if this future is dropped mid-way.
    pub async fn run<F, T>(&self, operation: &str, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let permit = self.acquire(operation).await;
        let output = work.await;
        permit.release().await;
        output
    }
}

/// A held GPU slot.
///
/// Release with [`GpuPermit::release`] to wait out the cooldown inline.
/// Dropping the permit releases it too; the cooldown then runs on a
/// detached task before the semaphore permit is returned.
#[derive(Debug)]
pub struct GpuPermit {
    operation: String,
    owner: LockOwner,
    wait_time: Duration,
    lock_wait: Duration,
    policy: Arc<GpuPolicy>,
    lock: Option<LockToken>,
    slot: Option<Slot>,
}

impl GpuPermit {
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    #[must_use]
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Time spent waiting for the in-process slot.
    #[must_use]
    pub const fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Time spent polling the cross-process lock.
    #[must_use]
    pub const fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    #[must_use]
    pub fn holds_cross_process_lock(&self) -> bool {
        self.lock.is_some()
    }

    /// Observability payload describing this acquisition.
    #[must_use]
    pub fn report(&self) -> PermitReport {
        PermitReport {
            operation: self.operation.clone(),
            owner: self.owner.to_string(),
            wait_ms: self.wait_time.as_millis() as u64,
            lock_wait_ms: self.lock_wait.as_millis() as u64,
            effective_concurrency: self.policy.effective_concurrency(),
            cross_process_lock: self.lock.is_some(),
            lock_path: self
                .lock
                .as_ref()
                .map(|_| self.policy.lock_path.clone()),
            cooldown_ms: self.policy.cooldown.as_millis() as u64,
        }
    }

    /// Release the lock directory, sit out the cooldown, then free the slot.
    pub async fn release(mut self) {
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
        let cooldown = self.policy.cooldown;
        if let Some(slot) = self.slot.take() {
            if !cooldown.is_zero() {
                sleep(cooldown).await;
            }
            drop(slot);
        }
    }
}

impl Drop for GpuPermit {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
        let Some(slot) = self.slot.take() else {
            return;
        };
        let cooldown = self.policy.cooldown;
        if cooldown.is_zero() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    sleep(cooldown).await;
                    drop(slot);
                });
            }
            Err(_) => drop(slot),
        }
    }
}

/// Payload attached to inference telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitReport {
    pub operation: String,
    pub owner: String,
    pub wait_ms: u64,
    pub lock_wait_ms: u64,
    pub effective_concurrency: usize,
    pub cross_process_lock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<PathBuf>,
    pub cooldown_ms: u64,
}

/// Arbiter counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterStats {
    /// Slots currently held, including ones sitting out their cooldown.
    pub in_flight: usize,
    pub acquisitions: u64,
    pub total_wait_ms: u64,
    pub max_wait_ms: u64,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    acquisitions: AtomicU64,
    total_wait_us: AtomicU64,
    max_wait_us: AtomicU64,
}

impl Counters {
    fn record_wait(&self, wait: Duration) {
        let micros = u64::try_from(wait.as_micros()).unwrap_or(u64::MAX);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.total_wait_us.fetch_add(micros, Ordering::Relaxed);
        self.max_wait_us.fetch_max(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ArbiterStats {
        ArbiterStats {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_us.load(Ordering::Relaxed) / 1_000,
            max_wait_ms: self.max_wait_us.load(Ordering::Relaxed) / 1_000,
        }
    }
}

/// In-process semaphore permit that keeps `in_flight` accurate.
#[derive(Debug)]
struct Slot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<Counters>,
}

impl Slot {
    async fn take(semaphore: &Arc<Semaphore>, stats: &Arc<Counters>) -> Self {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            unreachable!("the arbiter never closes its semaphore");
        };
        stats.in_flight.fetch_add(1, Ordering::Relaxed);
        Self {
            _permit: permit,
            stats: stats.clone(),
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
