//! Exclusive writer lock for a requirement workspace.
//!
//! The lock is a file created with `create_new`, so creation is the atomic
//! acquisition step. The payload records the owning pid and a one-shot token
//! so release never removes a lock the process does not own. Acquisition
//! polls up to a bounded timeout and fails with `WorkspaceBusy` rather than
//! blocking forever; a lock older than the staleness threshold whose owner
//! process is gone is treated as abandoned and reclaimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::LockConfig;
use crate::error::EngineError;

#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    token: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the workspace writer lock; released on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
    token: String,
}

impl WorkspaceLock {
    /// Acquire the writer lock for `workspace`, polling up to the configured
    /// timeout.
    pub fn acquire(
        path: &Path,
        workspace: &str,
        config: &LockConfig,
    ) -> Result<Self, EngineError> {
        let started = Instant::now();
        let token = uuid::Uuid::new_v4().to_string();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let owner = LockOwner {
                        pid: std::process::id(),
                        token: token.clone(),
                        acquired_at: Utc::now(),
                    };
                    let payload = serde_json::to_string(&owner)
                        .map_err(|e| EngineError::Storage(e.into()))?;
                    file.write_all(payload.as_bytes())
                        .map_err(|e| EngineError::Storage(e.into()))?;
                    return Ok(Self {
                        path: path.to_path_buf(),
                        token,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if reclaim_if_stale(path, config) {
                        continue;
                    }
                    let waited = started.elapsed();
                    if waited >= config.timeout() {
                        return Err(EngineError::WorkspaceBusy {
                            workspace: workspace.to_string(),
                            waited_secs: waited.as_secs_f64(),
                        });
                    }
                    std::thread::sleep(config.poll());
                }
                Err(e) => {
                    return Err(EngineError::Storage(anyhow::Error::new(e).context(
                        format!("Failed to create lock file: {}", path.display()),
                    )))
                }
            }
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        match read_owner(&self.path) {
            Some(owner) if owner.token == self.token => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to release workspace lock");
                }
            }
            // Someone reclaimed the lock out from under us; leave it alone.
            _ => {}
        }
    }
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Remove the lock if it is older than the staleness threshold and its owner
/// is no longer alive. Returns true when the caller should retry creation.
fn reclaim_if_stale(path: &Path, config: &LockConfig) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        // Lock vanished between the failed create and here; retry.
        return true;
    };
    let age = metadata
        .modified()
        .ok()
        .and_then(|mtime| std::time::SystemTime::now().duration_since(mtime).ok());
    let Some(age) = age else {
        return false;
    };
    if age < config.stale() {
        return false;
    }

    let owner_alive = read_owner(path).map(|owner| pid_alive(owner.pid));
    match owner_alive {
        Some(true) => false,
        // Dead owner, or an unreadable payload past the staleness threshold.
        Some(false) | None => {
            tracing::warn!(path = %path.display(), age_secs = age.as_secs(), "reclaiming abandoned workspace lock");
            fs::remove_file(path).is_ok()
        }
    }
}

/// Best-effort liveness probe via /proc. On systems without /proc the owner
/// is assumed alive, so reclaim never fires on a liveness misread alone.
fn pid_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    if !proc_root.exists() {
        return true;
    }
    proc_root.join(pid.to_string()).exists()
}
