//! Runtime-agnostic domain types shared by the resilience, GPU and stream
//! components.

mod breaker;
mod error_kind;
mod owner;
mod peer;

pub use breaker::BreakerState;
pub use error_kind::ErrorKind;
pub use owner::LockOwner;
pub use peer::Peer;
