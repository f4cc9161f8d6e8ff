//! Error classification used for retry and breaker accounting.

use std::fmt;

use serde::Serialize;

/// Coarse classification of a failed call.
///
/// Only [`ErrorKind::Transient`] is eligible for retry. Everything else is
/// either the peer's verdict on the request or a local decision, and
/// repeating the call cannot change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, timed out, or a 5xx response.
    Transient,
    /// Validation failure or 4xx response.
    Permanent,
    /// Rejected by an open circuit breaker without being attempted.
    CircuitOpen,
    /// A caller deadline on GPU slot acquisition elapsed.
    LockTimeout,
    /// Stream frame that failed to parse.
    Malformed,
}

impl ErrorKind {
    /// Return `true` if a call failing with this kind may be attempted again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Classify an HTTP status code that signals failure.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 || status == 408 || status == 429 {
            Self::Transient
        } else {
            Self::Permanent
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::CircuitOpen => "circuit_open",
            Self::LockTimeout => "lock_timeout",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
