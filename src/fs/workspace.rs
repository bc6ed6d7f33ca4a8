//! Workspace directory layout.
//!
//! One directory per requirement workspace:
//!
//! ```text
//! <root>/<workspace>/
//!   pipeline.yaml    - stage records, current stage, last reopen
//!   decisions.yaml   - decision-item table
//!   docs/            - one markdown document per stage
//!   workspace.lock   - writer lock (present only while held)
//!   snapshot.lock    - fs2 advisory lock for consistent reads
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::stage::StageName;
use crate::validation::validate_workspace_name;

pub const STATE_FILE: &str = "pipeline.yaml";
pub const DECISIONS_FILE: &str = "decisions.yaml";
pub const WRITER_LOCK_FILE: &str = "workspace.lock";
pub const SNAPSHOT_LOCK_FILE: &str = "snapshot.lock";

#[derive(Debug, Clone)]
pub struct WorkspaceDir {
    name: String,
    root: PathBuf,
    docs_dir: String,
}

impl WorkspaceDir {
    /// Resolve a workspace under the engine root, validating the name before
    /// any path construction.
    pub fn resolve(engine_root: &Path, name: &str, docs_dir: &str) -> Result<Self> {
        validate_workspace_name(name)
            .with_context(|| format!("Invalid workspace name: {name}"))?;
        Ok(Self {
            name: name.to_string(),
            root: engine_root.join(name),
            docs_dir: docs_dir.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn decisions_path(&self) -> PathBuf {
        self.root.join(DECISIONS_FILE)
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join(&self.docs_dir)
    }

    /// Document path for a stage; `None` for the validation stage.
    pub fn doc_path(&self, stage: StageName) -> Option<PathBuf> {
        stage.doc_file_name().map(|name| self.docs_dir().join(name))
    }

    pub fn writer_lock_path(&self) -> PathBuf {
        self.root.join(WRITER_LOCK_FILE)
    }

    pub fn snapshot_lock_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_LOCK_FILE)
    }

    /// Whether init has run for this workspace.
    pub fn is_initialized(&self) -> bool {
        self.state_path().exists()
    }

    /// Create the workspace directory tree; idempotent.
    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.docs_dir()).with_context(|| {
            format!("Failed to create workspace layout: {}", self.root.display())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_paths_use_order_prefixed_names() {
        let temp = tempfile::tempdir().unwrap();
        let ws = WorkspaceDir::resolve(temp.path(), "billing", "docs").unwrap();
        assert!(ws
            .doc_path(StageName::Prd)
            .unwrap()
            .ends_with("billing/docs/02-prd.md"));
        assert!(ws.doc_path(StageName::Validation).is_none());
    }

    #[test]
    fn invalid_name_is_rejected_before_path_use() {
        let temp = tempfile::tempdir().unwrap();
        assert!(WorkspaceDir::resolve(temp.path(), "../oops", "docs").is_err());
    }
}
