//! Directory-based cross-process mutex.
//!
//! `create_dir` is atomic: it either creates the directory (lock taken) or
//! fails with `AlreadyExists` (lock held elsewhere). The holder writes its
//! identity into an `owner` file inside the directory for diagnosis.
//!
//! A process that dies while holding the lock leaves the directory behind.
//! Nothing here removes a lock it does not hold; [`clear_lock`] exists for
//! operators and is never called by the arbiter.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::LockOwner;

/// Name of the file inside the lock directory holding the owner string.
pub const OWNER_FILE: &str = "owner";

/// A held cross-process lock. Removing the directory releases it.
///
/// Dropping the token releases the lock; [`LockToken::release`] does the
/// same explicitly.
#[derive(Debug)]
pub struct LockToken {
    path: PathBuf,
    owner: LockOwner,
    held: bool,
}

impl LockToken {
    /// Poll until the lock directory at `path` can be created.
    ///
    /// Never fails: contention and filesystem errors are both answered by
    /// sleeping `poll_interval` and trying again. Dropping the returned
    /// future while polling leaves nothing behind.
    pub async fn acquire(path: &Path, poll_interval: Duration, owner: LockOwner) -> Self {
        let mut contended = false;
        loop {
            match tokio::fs::create_dir(path).await {
                Ok(()) => {
                    let token = Self {
                        path: path.to_path_buf(),
                        owner,
                        held: true,
                    };
                    token.write_owner().await;
                    if contended {
                        info!(lock = %path.display(), owner = %token.owner, "Acquired cross-process GPU lock after contention");
                    } else {
                        debug!(lock = %path.display(), owner = %token.owner, "Acquired cross-process GPU lock");
                    }
                    return token;
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if !contended {
                        contended = true;
                        let holder = read_owner(path).await;
                        debug!(
                            lock = %path.display(),
                            holder = holder.as_deref().unwrap_or("unknown"),
                            "GPU lock held by another process, polling"
                        );
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    if let Some(parent) = path.parent() {
                        if let Err(err) = tokio::fs::create_dir_all(parent).await {
                            warn!(lock = %path.display(), error = %err, "Failed to create lock parent directory");
                        }
                    }
                }
                Err(err) => {
                    warn!(lock = %path.display(), error = %err, "Failed to create lock directory, retrying");
                }
            }
            sleep(poll_interval).await;
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Remove the owner file and the lock directory.
    ///
    /// Missing entries are ignored; other errors are logged, never returned.
    pub fn release(mut self) {
        self.remove();
    }

    async fn write_owner(&self) {
        let file = self.path.join(OWNER_FILE);
        if let Err(err) = tokio::fs::write(&file, self.owner.to_string()).await {
            warn!(lock = %self.path.display(), error = %err, "Failed to write lock owner file");
        }
    }

    fn remove(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;

        if let Err(err) = std::fs::remove_file(self.path.join(OWNER_FILE)) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(lock = %self.path.display(), error = %err, "Failed to remove lock owner file");
            }
        }
        match std::fs::remove_dir(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "Released cross-process GPU lock"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(lock = %self.path.display(), error = %err, "Failed to remove lock directory");
            }
        }
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        self.remove();
    }
}

async fn read_owner(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path.join(OWNER_FILE))
        .await
        .ok()
        .map(|raw| raw.trim().to_string())
}

/// Operator view of a lock directory.
#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub path: String,
    /// Something exists at the path, so acquisition would block.
    pub held: bool,
    /// False when the path is taken by a file or other non-directory entry.
    pub is_directory: bool,
    /// Raw owner file contents, if readable.
    pub owner_raw: Option<String>,
    /// Parsed owner, if the contents were written by this crate.
    pub owner: Option<LockOwner>,
    /// Seconds since the lock was taken, from the owner timestamp.
    pub age_secs: Option<i64>,
    /// Whether the owning pid still exists on this host.
    pub owner_alive: Option<bool>,
}

/// Describe the lock at `path` without modifying it.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be inspected.
pub fn inspect_lock(path: &Path) -> io::Result<LockStatus> {
    let (held, is_directory) = match std::fs::symlink_metadata(path) {
        Ok(meta) => (true, meta.is_dir()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (false, false),
        Err(err) => return Err(err),
    };
    let owner_raw = if is_directory {
        std::fs::read_to_string(path.join(OWNER_FILE))
            .ok()
            .map(|raw| raw.trim().to_string())
    } else {
        None
    };
    let owner = owner_raw.as_deref().and_then(LockOwner::parse);

    Ok(LockStatus {
        path: path.display().to_string(),
        held,
        is_directory,
        age_secs: owner.as_ref().map(|o| o.age().num_seconds()),
        owner_alive: owner.as_ref().map(|o| pid_alive(o.pid)),
        owner_raw,
        owner,
    })
}

/// Remove a lock directory left behind by a crashed holder, or any other
/// entry occupying the lock path.
///
/// Returns `false` if there was nothing to remove.
///
/// # Errors
///
/// Returns an error if the entry exists but cannot be removed.
pub fn clear_lock(path: &Path) -> io::Result<bool> {
    let removal = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(err) => Err(err),
    };
    match removal {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks that the process exists and may be signalled.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_writes_owner_and_release_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");

        let token = LockToken::acquire(&path, Duration::from_millis(5), LockOwner::current("embed")).await;
        let written = std::fs::read_to_string(path.join(OWNER_FILE)).unwrap();
        assert_eq!(written, token.owner().to_string());
        assert!(written.ends_with("-embed"));

        token.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gpu.lock");

        let token = LockToken::acquire(&path, Duration::from_millis(1), LockOwner::current("chat")).await;
        assert!(path.is_dir());
        drop(token);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");

        let token = LockToken::acquire(&path, Duration::from_millis(1), LockOwner::current("chat")).await;
        std::fs::remove_dir_all(&path).unwrap();
        token.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn waits_while_directory_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::create_dir(&path).unwrap();

        let pending = LockToken::acquire(&path, Duration::from_millis(5), LockOwner::current("chat"));
        let result = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(result.is_err());
        assert!(path.is_dir(), "foreign lock must be left in place");
    }

    #[test]
    fn inspect_reports_owner_of_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::create_dir(&path).unwrap();
        let owner = LockOwner::current("summarize");
        std::fs::write(path.join(OWNER_FILE), owner.to_string()).unwrap();

        let status = inspect_lock(&path).unwrap();
        assert!(status.held);
        assert_eq!(status.owner.as_ref().map(|o| o.pid), Some(std::process::id()));
        assert_eq!(status.owner_alive, Some(true));
    }

    #[test]
    fn inspect_and_clear_absent_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");

        let status = inspect_lock(&path).unwrap();
        assert!(!status.held);
        assert!(status.owner.is_none());
        assert!(!clear_lock(&path).unwrap());
    }

    #[test]
    fn file_at_lock_path_blocks_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::write(&path, "not a lock").unwrap();

        let status = inspect_lock(&path).unwrap();
        assert!(status.held);
        assert!(!status.is_directory);
        assert!(status.owner_raw.is_none());

        assert!(clear_lock(&path).unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn acquire_waits_on_file_at_lock_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::write(&path, "not a lock").unwrap();

        let pending = LockToken::acquire(&path, Duration::from_millis(5), LockOwner::current("chat"));
        let result = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(result.is_err());
        assert!(path.is_file());
    }

    #[test]
    fn clear_removes_stale_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join(OWNER_FILE), "1-1700000000.000000-crashed").unwrap();

        assert!(clear_lock(&path).unwrap());
        assert!(!path.exists());
    }
}
