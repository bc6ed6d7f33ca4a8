//! Snapshot locking for safe concurrent access
//!
//! Provides shared/exclusive guards over a workspace's snapshot lock file
//! using `fs2` advisory locks. Writers hold the exclusive guard across a
//! whole read-modify-write so readers never observe a document and its stage
//! record from two different in-flight writes; readers hold the shared guard
//! and run concurrently with each other.
//!
//! Advisory locks are cooperative - all participants must use these guards
//! for the locking to be effective.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// RAII guard over the snapshot lock file; unlocks on drop.
pub struct SnapshotLock {
    file: File,
}

impl SnapshotLock {
    /// Acquire a shared (read) lock, allowing multiple concurrent readers
    /// but blocking while an exclusive (write) lock is held.
    pub fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_shared()
            .with_context(|| format!("Failed to acquire shared lock: {}", path.display()))?;
        Ok(Self { file })
    }

    /// Acquire an exclusive (write) lock, blocking until all readers and
    /// any other writer have released theirs.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire exclusive lock: {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn shared_locks_coexist() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.lock");

        let _a = SnapshotLock::shared(&path).unwrap();
        let _b = SnapshotLock::shared(&path).unwrap();
    }

    #[test]
    fn exclusive_lock_serializes_writers() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.lock");
        let data = temp.path().join("data.txt");
        std::fs::write(&data, "initial").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                let data = data.clone();
                thread::spawn(move || {
                    let _guard = SnapshotLock::exclusive(&path).unwrap();
                    std::fs::write(&data, format!("writer {i}")).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&data).unwrap();
        assert!(content.starts_with("writer "));
    }
}
