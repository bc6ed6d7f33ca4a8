//! Pipeline state file I/O.
//!
//! Reads and writes `pipeline.yaml` for a workspace. Saves are atomic
//! (temp file + rename) and bump the optimistic version counter so an
//! out-of-band rewrite of the file is detectable.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;

use super::workspace::WorkspaceDir;
use super::write_atomic;
use crate::models::pipeline::PipelineState;
use crate::models::stage::StageStatus;

pub fn load_state(workspace: &WorkspaceDir) -> Result<PipelineState> {
    let path = workspace.state_path();
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read pipeline state: {}", path.display()))?;
    let mut state: PipelineState = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse pipeline state: {}", path.display()))?;
    state.repair(Utc::now());
    Ok(state)
}

pub fn save_state(workspace: &WorkspaceDir, state: &mut PipelineState) -> Result<()> {
    // Stale is a read-side derivation; the persisted file only ever carries
    // pending for a drifted stage.
    debug_assert!(state
        .stages
        .values()
        .all(|record| record.status != StageStatus::Stale));

    state.version += 1;
    let yaml =
        serde_yaml::to_string(state).context("Failed to serialize pipeline state to YAML")?;
    write_atomic(&workspace.state_path(), &yaml)
}
