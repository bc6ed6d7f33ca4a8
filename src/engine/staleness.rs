//! Read-side staleness derivation and its single persistence path.

use chrono::Utc;
use std::collections::BTreeMap;

use super::Engine;
use crate::error::Result;
use crate::fs::documents::live_fingerprints;
use crate::fs::state_files::{load_state, save_state};
use crate::models::pipeline::{PipelineState, ReopenRecord, ReopenSource};
use crate::models::stage::{StageName, StageStatus};

/// Derive the observable status of a stage.
///
/// A completed stage is stale when its own document drifted or any recorded
/// upstream fingerprint no longer matches the live upstream document. The
/// validation stage carries no document; it is stale when any document stage
/// is not itself live-completed, or when the documents drifted since the
/// validation verdict. Everything else passes through unchanged.
pub(crate) fn derive_live_status(
    state: &PipelineState,
    live: &BTreeMap<StageName, String>,
    stage: StageName,
) -> StageStatus {
    let record = state.record(stage);
    if record.status != StageStatus::Completed {
        return record.status;
    }

    if stage.is_doc_stage() {
        if live.get(&stage) != Some(&record.doc_fingerprint) {
            return StageStatus::Stale;
        }
    } else {
        for dep in StageName::DOC_STAGES {
            if derive_live_status(state, live, dep) != StageStatus::Completed {
                return StageStatus::Stale;
            }
        }
    }

    for dep in stage.upstream() {
        if record.upstream_fingerprints.get(dep) != live.get(dep) {
            return StageStatus::Stale;
        }
    }

    StageStatus::Completed
}

/// Stages whose live status is stale, in pipeline order.
pub(crate) fn stale_stages(
    state: &PipelineState,
    live: &BTreeMap<StageName, String>,
) -> Vec<StageName> {
    StageName::ORDER
        .iter()
        .filter(|stage| derive_live_status(state, live, **stage) == StageStatus::Stale)
        .copied()
        .collect()
}

impl Engine {
    /// Observable status of one stage; never mutates anything.
    pub fn live_status(&self, name: &str, stage: StageName) -> Result<StageStatus> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.read_guard(&workspace)?;
        let state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;
        Ok(derive_live_status(&state, &live, stage))
    }

    /// Persist `pending` for every stage whose live status is stale.
    ///
    /// This is the only path that writes staleness down; every other
    /// operation just reports it. Returns the stages that were normalized.
    pub fn normalize_staleness(&self, name: &str) -> Result<Vec<StageName>> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;
        let stale = stale_stages(&state, &live);
        if stale.is_empty() {
            return Ok(stale);
        }

        let now = Utc::now();
        for stage in &stale {
            state.record_mut(*stage).reopen("upstream content drifted", now);
        }
        state.last_reopen = Some(ReopenRecord {
            stage: stale[0],
            cause: "staleness normalized".to_string(),
            codes: Vec::new(),
            source: ReopenSource::Normalize,
            at: now,
        });
        state.current_stage = state.recommended_next_stage();
        state.updated_at = now;
        save_state(&workspace, &mut state)?;
        tracing::info!(
            workspace = name,
            stages = ?stale,
            "persisted pending for stale stages"
        );
        Ok(stale)
    }
}
