//! Orchestration engine: the stage dependency and staleness state machine.
//!
//! The engine composes the content store, signature engine, decision gate,
//! and stage graph. Every operation takes an explicit workspace name; there
//! is no process-wide notion of a current workspace. Mutating operations run
//! under the workspace writer lock plus an exclusive snapshot lock; reads
//! take only a shared snapshot lock and run concurrently with each other.

mod complete;
mod context;
mod decisions;
mod reopen;
mod staleness;
mod status;

pub use complete::CompletionAck;
pub use context::{ContextPayload, UpstreamDoc};
pub use status::{StageStatusEntry, StatusReport};

use anyhow::Context as _;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fs::state_files::{load_state, save_state};
use crate::fs::{SnapshotLock, WorkspaceDir, WorkspaceLock};
use crate::models::pipeline::PipelineState;
use crate::models::stage::StageName;

pub struct Engine {
    root: PathBuf,
    config: EngineConfig,
}

/// Both guards for a read-modify-write, writer lock first.
pub(crate) struct WriteGuard {
    _writer: WorkspaceLock,
    _snapshot: SnapshotLock,
}

impl Engine {
    /// Engine rooted at a directory of workspaces, configured from an
    /// optional `weft.toml` beside them.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = EngineConfig::load(&root)?;
        Ok(Self { root, config })
    }

    pub fn with_config(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn workspace(&self, name: &str) -> Result<WorkspaceDir> {
        Ok(WorkspaceDir::resolve(&self.root, name, &self.config.docs_dir)?)
    }

    /// Resolve a workspace that must already have pipeline state.
    pub(crate) fn initialized_workspace(&self, name: &str) -> Result<WorkspaceDir> {
        let workspace = self.workspace(name)?;
        if !workspace.is_initialized() {
            return Err(EngineError::WorkspaceNotInitialized {
                workspace: name.to_string(),
            });
        }
        Ok(workspace)
    }

    pub(crate) fn write_guard(&self, workspace: &WorkspaceDir) -> Result<WriteGuard> {
        let writer = WorkspaceLock::acquire(
            &workspace.writer_lock_path(),
            workspace.name(),
            &self.config.lock,
        )?;
        let snapshot = SnapshotLock::exclusive(&workspace.snapshot_lock_path())?;
        Ok(WriteGuard {
            _writer: writer,
            _snapshot: snapshot,
        })
    }

    pub(crate) fn read_guard(&self, workspace: &WorkspaceDir) -> Result<SnapshotLock> {
        Ok(SnapshotLock::shared(&workspace.snapshot_lock_path())?)
    }

    /// Create pipeline state for a workspace; idempotent. Existing state and
    /// documents are left untouched.
    pub fn init(&self, name: &str) -> Result<PipelineState> {
        let workspace = self.workspace(name)?;
        workspace.ensure_layout()?;
        let _guard = self.write_guard(&workspace)?;

        if workspace.is_initialized() {
            return Ok(load_state(&workspace)?);
        }
        let mut state = PipelineState::new(Utc::now());
        save_state(&workspace, &mut state)?;
        tracing::info!(workspace = name, "workspace initialized");
        Ok(state)
    }

    /// Clear pipeline state back to all-pending; idempotent. Documents are
    /// never deleted, so previously authored content survives a reset and
    /// simply awaits re-completion.
    pub fn reset(&self, name: &str) -> Result<PipelineState> {
        let workspace = self.workspace(name)?;
        workspace.ensure_layout()?;
        let _guard = self.write_guard(&workspace)?;

        let version = if workspace.is_initialized() {
            load_state(&workspace)?.version
        } else {
            0
        };
        let mut state = PipelineState::new(Utc::now());
        state.version = version;
        save_state(&workspace, &mut state)?;
        tracing::info!(workspace = name, "workspace reset");
        Ok(state)
    }

    /// Current content of a stage document, if any.
    pub fn read_document(&self, name: &str, stage: StageName) -> Result<Option<String>> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.read_guard(&workspace)?;
        Ok(crate::fs::documents::read_document(&workspace, stage)?)
    }

    /// Write a stage document outside the completion path.
    ///
    /// This is the upstream-drift entry point: rewriting a completed
    /// stage's document does not touch any stage record, so downstream
    /// staleness is observable immediately on the next read.
    pub fn write_document(&self, name: &str, stage: StageName, content: &str) -> Result<()> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;
        crate::fs::documents::write_document(&workspace, stage, content)
            .with_context(|| format!("Failed to write {stage} document"))?;
        Ok(())
    }
}
