//! Application services (use cases).
//!
//! These components wrap the fleet's unreliable edges: peer calls, the
//! shared GPU, and push feeds.

pub mod gpu;
pub mod resilience;
pub mod stream;
