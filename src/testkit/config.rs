//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::path::Path;
use std::time::Duration;

use crate::application::gpu::GpuPolicy;
use crate::application::resilience::BreakerConfig;
use crate::application::stream::ReconnectConfig;

/// Breaker that opens after `threshold` failures and cools down in `reset`.
pub fn breaker(threshold: u32, reset: Duration) -> BreakerConfig {
    BreakerConfig {
        failure_threshold: threshold,
        reset_timeout: reset,
    }
}

/// Reconnect config with small, distinct delays and no required fields.
pub fn reconnect(base_ms: u64, max_ms: u64) -> ReconnectConfig {
    ReconnectConfig {
        base_delay: Duration::from_millis(base_ms),
        max_delay: Duration::from_millis(max_ms),
        required_fields: Vec::new(),
    }
}

/// In-process-only GPU policy with `max_concurrency` slots and no cooldown.
pub fn local_gpu(max_concurrency: usize) -> GpuPolicy {
    GpuPolicy {
        max_concurrency,
        cross_process_lock: false,
        cooldown: Duration::ZERO,
        wait_log_threshold: Duration::from_secs(60),
        ..GpuPolicy::default()
    }
}

/// Single-slot GPU policy locking `lock_path` across processes.
pub fn shared_gpu(lock_path: &Path) -> GpuPolicy {
    GpuPolicy {
        max_concurrency: 1,
        cross_process_lock: true,
        cooldown: Duration::ZERO,
        lock_path: lock_path.to_path_buf(),
        lock_poll_interval: Duration::from_millis(2),
        wait_log_threshold: Duration::from_secs(60),
        ..GpuPolicy::default()
    }
}
