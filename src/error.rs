use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::ErrorKind;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },
}

/// A call rejected by an open circuit breaker without being attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("circuit breaker for '{dependency}' is open")]
pub struct CircuitOpenError {
    /// Name of the protected dependency.
    pub dependency: String,
}

/// A feed frame that could not be turned into a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessageError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field '{0}'")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error(transparent)]
    Malformed(#[from] MalformedMessageError),

    /// Network or timeout failure talking to a peer. Retryable.
    #[error("transient transport error calling {dependency}: {reason}")]
    Transient { dependency: String, reason: String },

    /// Request rejected by the peer (4xx, validation). Never retried.
    #[error("{dependency} rejected request{}: {reason}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Permanent {
        dependency: String,
        status: Option<u16>,
        reason: String,
    },

    /// A caller-imposed deadline on GPU slot acquisition elapsed.
    #[error("timed out after {waited:?} waiting for GPU lock at {}", .lock_path.display())]
    LockContentionTimeout { lock_path: PathBuf, waited: Duration },

    /// Refused to remove a lock whose owner process is still running.
    #[error("lock at {} is held by running process {pid}; pass --force to remove it", .lock_path.display())]
    LockHeld { lock_path: PathBuf, pid: u32 },

    #[error("{failed} of {total} peers failed the health check")]
    PeersUnhealthy { failed: usize, total: usize },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl Error {
    /// Build a transient error for `dependency`.
    pub fn transient(dependency: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transient {
            dependency: dependency.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a permanent error for `dependency`.
    pub fn permanent(
        dependency: impl Into<String>,
        status: Option<u16>,
        reason: impl ToString,
    ) -> Self {
        Self::Permanent {
            dependency: dependency.into(),
            status,
            reason: reason.to_string(),
        }
    }

    /// Classify this error for retry and breaker accounting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient { .. } | Self::Io(_) | Self::WebSocket(_) | Self::Connection(_) => {
                ErrorKind::Transient
            }
            Self::Http(err) => classify_http(err),
            Self::CircuitOpen(_) => ErrorKind::CircuitOpen,
            Self::LockContentionTimeout { .. } => ErrorKind::LockTimeout,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::PeersUnhealthy { .. } => ErrorKind::Transient,
            Self::Permanent { .. }
            | Self::LockHeld { .. }
            | Self::Config(_)
            | Self::Json(_)
            | Self::Url(_) => ErrorKind::Permanent,
        }
    }
}

/// Connect, timeout and 5xx failures are transient; everything else is permanent.
fn classify_http(err: &reqwest::Error) -> ErrorKind {
    if let Some(status) = err.status() {
        return ErrorKind::from_status(status.as_u16());
    }
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}

/// Errors that can be classified into an [`ErrorKind`].
///
/// The retry policy and circuit breaker are generic over this so callers
/// with their own error types can reuse them.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
    fn kind(&self) -> ErrorKind {
        Error::kind(self)
    }
}
