//! Pipeline status reporting.

use serde::Serialize;

use super::staleness::{derive_live_status, stale_stages};
use super::Engine;
use crate::error::Result;
use crate::fs::documents::live_fingerprints;
use crate::fs::state_files::load_state;
use crate::models::pipeline::ReopenRecord;
use crate::models::stage::{StageName, StageStatus};

#[derive(Debug, Clone, Serialize)]
pub struct StageStatusEntry {
    pub stage: StageName,
    /// Observable status, staleness included.
    pub status: StageStatus,
    /// What the state file says; differs from `status` only for stale stages.
    pub persisted_status: StageStatus,
    pub agent: String,
    pub notes: String,
    pub doc_exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub workspace: String,
    pub current_stage: StageName,
    pub stages: Vec<StageStatusEntry>,
    pub stale_stages: Vec<StageName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reopen: Option<ReopenRecord>,
    pub version: u64,
}

impl Engine {
    /// Assemble the status report. With `normalize`, stale stages are first
    /// persisted as pending (the explicit mutation path); without it this is
    /// a pure read.
    pub fn status(&self, name: &str, normalize: bool) -> Result<StatusReport> {
        if normalize {
            self.normalize_staleness(name)?;
        }

        let workspace = self.initialized_workspace(name)?;
        let _guard = self.read_guard(&workspace)?;
        let state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;

        let stages = StageName::ORDER
            .iter()
            .map(|stage| {
                let record = state.record(*stage);
                StageStatusEntry {
                    stage: *stage,
                    status: derive_live_status(&state, &live, *stage),
                    persisted_status: record.status,
                    agent: record.agent.clone(),
                    notes: record.notes.clone(),
                    doc_exists: live.contains_key(stage),
                }
            })
            .collect();

        Ok(StatusReport {
            workspace: name.to_string(),
            current_stage: state.current_stage,
            stages,
            stale_stages: stale_stages(&state, &live),
            last_reopen: state.last_reopen.clone(),
            version: state.version,
        })
    }
}
