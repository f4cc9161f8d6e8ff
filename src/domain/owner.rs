//! Identity written into the cross-process lock token.
//!
//! The owner string is `"{pid}-{unix_secs}.{micros}-{operation}"`. The
//! operation name may itself contain dashes, so parsing splits on the first
//! two only.

use std::fmt;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::Serialize;

/// Holder of the cross-process GPU lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockOwner {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub operation: String,
}

impl LockOwner {
    /// Owner record for the current process, stamped now.
    #[must_use]
    pub fn current(operation: impl Into<String>) -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now().trunc_subsecs(6),
            operation: operation.into(),
        }
    }

    /// Parse an owner string read back from a lock token.
    ///
    /// Returns `None` when the string was not written by this crate.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().splitn(3, '-');
        let pid = parts.next()?.parse().ok()?;
        let stamp = parts.next()?;
        let operation = parts.next()?.to_string();

        let (secs, micros) = stamp.split_once('.')?;
        let secs: i64 = secs.parse().ok()?;
        let micros: u32 = micros.parse().ok()?;
        if micros >= 1_000_000 {
            return None;
        }
        let acquired_at = Utc.timestamp_opt(secs, micros * 1_000).single()?;

        Some(Self {
            pid,
            acquired_at,
            operation,
        })
    }

    /// How long ago the lock was taken, clamped at zero for clock skew.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        (Utc::now() - self.acquired_at).max(chrono::Duration::zero())
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}.{:06}-{}",
            self.pid,
            self.acquired_at.timestamp(),
            self.acquired_at.timestamp_subsec_micros(),
            self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_pid_micros_and_operation() {
        let owner = LockOwner {
            pid: 4242,
            acquired_at: Utc.timestamp_opt(1_700_000_000, 5_000).unwrap(),
            operation: "embed".into(),
        };
        assert_eq!(owner.to_string(), "4242-1700000000.000005-embed");
    }

    #[test]
    fn parses_operation_with_dashes() {
        let owner = LockOwner::parse("17-1700000000.250000-chat-completion\n").unwrap();
        assert_eq!(owner.pid, 17);
        assert_eq!(owner.operation, "chat-completion");
        assert_eq!(owner.acquired_at.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn rejects_foreign_contents() {
        assert!(LockOwner::parse("").is_none());
        assert!(LockOwner::parse("held by ops").is_none());
        assert!(LockOwner::parse("12-notatime-op").is_none());
    }

    #[test]
    fn current_owner_round_trips() {
        let owner = LockOwner::current("rerank");
        let parsed = LockOwner::parse(&owner.to_string()).unwrap();
        assert_eq!(parsed, owner);
    }
}
