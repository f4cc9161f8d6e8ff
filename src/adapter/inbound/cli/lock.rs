//! `bulwark lock`: inspect and clear the cross-process GPU lock.
//!
//! The arbiter never removes a lock it does not hold. A holder that died
//! leaves its directory behind, and these commands are how an operator
//! finds and removes it.

use std::path::PathBuf;

use tracing::info;

use crate::adapter::inbound::cli::command::{LockClearArgs, LockPathArg};
use crate::adapter::inbound::cli::output;
use crate::application::gpu::{clear_lock, inspect_lock, GpuPolicy, LockStatus};
use crate::error::{Error, Result};

fn resolve_path(arg: &LockPathArg) -> Result<PathBuf> {
    match &arg.path {
        Some(path) => Ok(path.clone()),
        None => Ok(GpuPolicy::from_env()?.lock_path),
    }
}

/// Describe the lock without touching it.
pub fn execute_status(args: &LockPathArg) -> Result<()> {
    let path = resolve_path(args)?;
    let status = inspect_lock(&path)?;

    if output::is_json() {
        output::document("lock_status", &status)?;
        return Ok(());
    }

    output::section("GPU Lock");
    output::field("Path", &status.path);
    if !status.held {
        output::success("Lock is free");
        return Ok(());
    }
    render_holder(&status);
    Ok(())
}

fn render_holder(status: &LockStatus) {
    if !status.is_directory {
        output::warning("Lock path is a non-directory entry; acquisition blocks until it is removed");
        output::hint("`bulwark lock clear` removes it");
        return;
    }
    output::field("Owner", status.owner_raw.as_deref().unwrap_or("unknown"));
    if let Some(owner) = &status.owner {
        output::field("PID", owner.pid);
        output::field("Operation", &owner.operation);
        output::field("Acquired", owner.acquired_at.to_rfc3339());
    }
    if let Some(age) = status.age_secs {
        output::field("Age", format!("{age}s"));
    }
    match status.owner_alive {
        Some(true) => output::field("Owner process", output::status("running", true)),
        Some(false) => {
            output::field("Owner process", output::status("not running", false));
            output::hint("the holder is gone; `bulwark lock clear` removes the lock");
        }
        None => output::warning("Owner file is missing or was not written by bulwark"),
    }
}

/// Remove the lock directory unless its owner is alive (or `--force`).
pub fn execute_clear(args: &LockClearArgs) -> Result<()> {
    let path = resolve_path(&args.lock)?;
    let status = inspect_lock(&path)?;

    if !status.held {
        output::success("No lock to clear");
        return Ok(());
    }
    if let (Some(owner), Some(true)) = (&status.owner, status.owner_alive) {
        if !args.force {
            return Err(Error::LockHeld {
                lock_path: path,
                pid: owner.pid,
            });
        }
        output::warning(&format!("Removing lock held by running process {}", owner.pid));
    }

    let removed = clear_lock(&path)?;
    info!(lock = %path.display(), owner = ?status.owner_raw, removed, "GPU lock cleared by operator");
    if removed {
        output::success(&format!("Removed {}", path.display()));
    } else {
        output::success("Lock disappeared before it could be removed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gpu::OWNER_FILE;
    use crate::domain::LockOwner;

    fn clear_args(path: PathBuf, force: bool) -> LockClearArgs {
        LockClearArgs {
            lock: LockPathArg { path: Some(path) },
            force,
        }
    }

    #[test]
    fn clear_refuses_live_owner_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join(OWNER_FILE), LockOwner::current("embed").to_string()).unwrap();

        let err = execute_clear(&clear_args(path.clone(), false)).unwrap_err();
        assert!(matches!(err, Error::LockHeld { pid, .. } if pid == std::process::id()));
        assert!(path.is_dir());

        execute_clear(&clear_args(path.clone(), true)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn clear_removes_lock_without_owner_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::create_dir(&path).unwrap();

        execute_clear(&clear_args(path.clone(), false)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn clear_removes_file_blocking_lock_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu.lock");
        std::fs::write(&path, "stray").unwrap();

        execute_status(&LockPathArg { path: Some(path.clone()) }).unwrap();
        execute_clear(&clear_args(path.clone(), false)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn status_of_free_lock_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let args = LockPathArg {
            path: Some(dir.path().join("gpu.lock")),
        };
        execute_status(&args).unwrap();
    }
}
