//! GPU slot arbitration.
//!
//! # Data Flow
//! ```text
//! acquire(operation):
//!     → in-process semaphore (max_concurrency permits)
//!     → cross-process lock directory (only when max_concurrency == 1
//!       and cross-process locking is on), polled until created
//!     → GpuPermit held for the GPU-bound call
//! release:
//!     → remove lock directory → cooldown → return semaphore permit
//! ```
//!
//! The semaphore is taken first, so a process never contends for the
//! directory with more than one of its own tasks.

mod arbiter;
mod lock;
mod policy;

pub use arbiter::{ArbiterStats, GpuArbiter, GpuPermit, PermitReport};
pub use lock::{clear_lock, inspect_lock, LockStatus, LockToken, OWNER_FILE};
pub use policy::{GpuPolicy, PolicySnapshot, RuntimeOptions};
