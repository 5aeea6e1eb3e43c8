//! Release lock: one mutating release run per working tree
//!
//! The lock is a file created with `create_new`, so two runs racing for it
//! cannot both succeed. It records the holder's pid and start time and is
//! removed when the guard is dropped. A lock whose pid is no longer running
//! is stale: it does not count as held and the next `acquire` replaces it.

use crate::core::error::{ErrorCode, ReleaseError, ReleaseResult};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Lock file name, relative to the workspace root
pub const LOCK_FILE: &str = ".releasekit.lock";

/// Guard for an acquired release lock
#[derive(Debug)]
pub struct ReleaseLock {
  path: PathBuf,
}

impl ReleaseLock {
  /// Acquire the lock for `workspace_root`
  pub fn acquire(workspace_root: &Path) -> ReleaseResult<Self> {
    let path = workspace_root.join(LOCK_FILE);
    if is_stale(&path) {
      tracing::warn!("removing stale release lock {}", path.display());
      if let Err(err) = fs::remove_file(&path) {
        tracing::warn!("cannot remove {}: {}", path.display(), err);
      }
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
      Ok(file) => file,
      Err(err) if err.kind() == ErrorKind::AlreadyExists => {
        let holder = fs::read_to_string(&path).unwrap_or_default();
        return Err(ReleaseError::coded(
          ErrorCode::StateLocked,
          format!(
            "another release run holds {} ({})",
            path.display(),
            holder.trim().replace('\n', ", ")
          ),
        ));
      }
      Err(err) => {
        return Err(ReleaseError::coded(
          ErrorCode::StateLockIo,
          format!("cannot create {}: {}", path.display(), err),
        ));
      }
    };

    let contents = format!("pid={}\nstarted={}\n", std::process::id(), chrono::Utc::now().to_rfc3339());
    file
      .write_all(contents.as_bytes())
      .map_err(|err| ReleaseError::coded(ErrorCode::StateLockIo, format!("cannot write {}: {}", path.display(), err)))?;

    tracing::debug!("acquired release lock {}", path.display());
    Ok(Self { path })
  }

  /// Whether a live run currently holds the lock
  pub fn is_held(workspace_root: &Path) -> bool {
    let path = workspace_root.join(LOCK_FILE);
    path.exists() && !is_stale(&path)
  }

  /// Path of the lock file
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for ReleaseLock {
  fn drop(&mut self) {
    if let Err(err) = fs::remove_file(&self.path) {
      tracing::warn!("failed to release lock {}: {}", self.path.display(), err);
    }
  }
}

fn holder_pid(path: &Path) -> Option<u32> {
  let contents = fs::read_to_string(path).ok()?;
  contents
    .lines()
    .find_map(|line| line.strip_prefix("pid="))
    .and_then(|pid| pid.trim().parse().ok())
}

/// True only when the recorded pid is known to be gone. Without `/proc`
/// liveness cannot be checked and the lock is treated as live.
fn is_stale(path: &Path) -> bool {
  let proc = Path::new("/proc");
  if !proc.join("self").exists() {
    return false;
  }
  match holder_pid(path) {
    Some(pid) => !proc.join(pid.to_string()).exists(),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_second_acquire_fails_until_drop() {
    let dir = tempfile::tempdir().unwrap();

    let lock = ReleaseLock::acquire(dir.path()).unwrap();
    assert!(ReleaseLock::is_held(dir.path()));

    let err = ReleaseLock::acquire(dir.path()).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::StateLocked));

    drop(lock);
    assert!(!ReleaseLock::is_held(dir.path()));
    assert!(ReleaseLock::acquire(dir.path()).is_ok());
  }

  #[test]
  fn test_lock_records_pid() {
    let dir = tempfile::tempdir().unwrap();
    let lock = ReleaseLock::acquire(dir.path()).unwrap();
    let contents = fs::read_to_string(lock.path()).unwrap();
    assert!(contents.starts_with(&format!("pid={}", std::process::id())));
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn test_lock_of_dead_process_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(LOCK_FILE);
    fs::write(&path, "pid=999999999\nstarted=2026-01-01T00:00:00Z\n").unwrap();
    assert!(!ReleaseLock::is_held(dir.path()));

    let lock = ReleaseLock::acquire(dir.path()).unwrap();
    let contents = fs::read_to_string(lock.path()).unwrap();
    assert!(contents.starts_with(&format!("pid={}", std::process::id())));
  }

  #[test]
  fn test_unreadable_holder_counts_as_held() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(LOCK_FILE), "garbage").unwrap();
    assert!(ReleaseLock::is_held(dir.path()));
    let err = ReleaseLock::acquire(dir.path()).unwrap_err();
    assert!(err.to_string().contains(LOCK_FILE));
  }
}
