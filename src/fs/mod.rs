pub mod decision_files;
pub mod documents;
pub mod locking;
pub mod state_files;
pub mod workspace;
pub mod workspace_lock;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub use locking::SnapshotLock;
pub use workspace::WorkspaceDir;
pub use workspace_lock::WorkspaceLock;

/// Write file contents atomically: write a sibling temp file, then rename
/// over the target. Readers never observe a half-written file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("path has no file name")?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write temp file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to rename into place: {}", path.display()))?;
    Ok(())
}
