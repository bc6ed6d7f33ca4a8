//! Pipeline state: the ordered stage records for one requirement workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stage::{StageName, StageRecord, StageStatus};

/// Why a reopen happened, for the `last_reopen` marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReopenSource {
    /// Validation reported issues that mapped to a document stage.
    Validation,
    /// A caller reopened explicitly.
    Manual,
    /// Staleness normalization persisted pending for drifted stages.
    Normalize,
}

impl std::fmt::Display for ReopenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReopenSource::Validation => write!(f, "validation"),
            ReopenSource::Manual => write!(f, "manual"),
            ReopenSource::Normalize => write!(f, "normalize"),
        }
    }
}

/// Record of the most recent reopen cascade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReopenRecord {
    /// The earliest stage that was reopened; everything after it cascaded.
    pub stage: StageName,
    pub cause: String,
    /// Issue codes that drove the reopen, used to narrow authoring targets.
    #[serde(default)]
    pub codes: Vec<String>,
    pub source: ReopenSource,
    pub at: DateTime<Utc>,
}

/// The persisted pipeline state for one requirement workspace.
///
/// One record per stage, a pointer to the recommended next stage, and the
/// last-reopen marker. The version counter increments on every save so an
/// out-of-band rewrite of the state file is detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub version: u64,
    pub current_stage: StageName,
    pub stages: BTreeMap<StageName, StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reopen: Option<ReopenRecord>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    /// Fresh state: every stage pending, analysis up next.
    pub fn new(now: DateTime<Utc>) -> Self {
        let stages = StageName::ORDER
            .iter()
            .map(|stage| (*stage, StageRecord::new(*stage, now)))
            .collect();
        Self {
            version: 0,
            current_stage: StageName::Analysis,
            stages,
            last_reopen: None,
            updated_at: now,
        }
    }

    pub fn record(&self, stage: StageName) -> &StageRecord {
        // Every stage is seeded in new() and never removed; missing entries
        // from hand-edited state files are repaired on load.
        self.stages
            .get(&stage)
            .unwrap_or_else(|| panic!("stage record missing: {stage}"))
    }

    pub fn record_mut(&mut self, stage: StageName) -> &mut StageRecord {
        self.stages
            .get_mut(&stage)
            .unwrap_or_else(|| panic!("stage record missing: {stage}"))
    }

    /// Re-seed any stage record a hand-edited state file lost.
    pub fn repair(&mut self, now: DateTime<Utc>) {
        for stage in StageName::ORDER {
            self.stages
                .entry(stage)
                .or_insert_with(|| StageRecord::new(stage, now));
        }
    }

    pub fn set_status(&mut self, stage: StageName, status: StageStatus, now: DateTime<Utc>) {
        let record = self.record_mut(stage);
        record.status = status;
        record.updated_at = now;
    }

    /// The first stage that is not completed and whose upstream stages all
    /// are. Falls back to validation when everything is done.
    pub fn recommended_next_stage(&self) -> StageName {
        for stage in StageName::ORDER {
            if self.record(stage).status == StageStatus::Completed {
                continue;
            }
            let blocked = stage
                .upstream()
                .iter()
                .any(|dep| self.record(*dep).status != StageStatus::Completed);
            if !blocked {
                return stage;
            }
        }
        StageName::Validation
    }

    /// Reopen `stage` and every later stage: pending, fingerprints
    /// cleared, cause recorded. Stages already pending are left untouched
    /// apart from the `last_reopen` marker, which always updates.
    pub fn reopen_from(
        &mut self,
        stage: StageName,
        cause: &str,
        codes: Vec<String>,
        source: ReopenSource,
        now: DateTime<Utc>,
    ) {
        for target in &StageName::ORDER[stage.position()..] {
            let record = self.record_mut(*target);
            if record.status == StageStatus::Pending {
                continue;
            }
            record.reopen(cause, now);
        }
        self.last_reopen = Some(ReopenRecord {
            stage,
            cause: cause.to_string(),
            codes,
            source,
            at: now,
        });
        self.current_stage = self.recommended_next_stage();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_through(state: &mut PipelineState, last: StageName, now: DateTime<Utc>) {
        for stage in StageName::ORDER {
            if stage > last {
                break;
            }
            state.set_status(stage, StageStatus::Completed, now);
        }
    }

    #[test]
    fn fresh_state_recommends_analysis() {
        let state = PipelineState::new(Utc::now());
        assert_eq!(state.recommended_next_stage(), StageName::Analysis);
    }

    #[test]
    fn next_stage_skips_completed_prefix() {
        let now = Utc::now();
        let mut state = PipelineState::new(now);
        completed_through(&mut state, StageName::Prd, now);
        assert_eq!(state.recommended_next_stage(), StageName::Tech);
    }

    #[test]
    fn reopen_from_tech_leaves_earlier_stages_alone() {
        let now = Utc::now();
        let mut state = PipelineState::new(now);
        completed_through(&mut state, StageName::Acceptance, now);
        state.reopen_from(
            StageName::Tech,
            "schema conflict",
            vec!["tech.schema_conflict".to_string()],
            ReopenSource::Validation,
            now,
        );

        assert_eq!(state.record(StageName::Analysis).status, StageStatus::Completed);
        assert_eq!(state.record(StageName::Prd).status, StageStatus::Completed);
        assert_eq!(state.record(StageName::Tech).status, StageStatus::Pending);
        assert_eq!(state.record(StageName::Acceptance).status, StageStatus::Pending);
        assert_eq!(state.current_stage, StageName::Tech);
    }

    #[test]
    fn reopen_is_idempotent_on_statuses() {
        let now = Utc::now();
        let mut state = PipelineState::new(now);
        completed_through(&mut state, StageName::Acceptance, now);
        state.reopen_from(StageName::Prd, "drift", Vec::new(), ReopenSource::Manual, now);
        let statuses: Vec<_> = StageName::ORDER
            .iter()
            .map(|s| state.record(*s).status)
            .collect();
        let notes: Vec<_> = StageName::ORDER
            .iter()
            .map(|s| state.record(*s).notes.clone())
            .collect();

        state.reopen_from(StageName::Prd, "drift again", Vec::new(), ReopenSource::Manual, now);
        let statuses_after: Vec<_> = StageName::ORDER
            .iter()
            .map(|s| state.record(*s).status)
            .collect();
        let notes_after: Vec<_> = StageName::ORDER
            .iter()
            .map(|s| state.record(*s).notes.clone())
            .collect();

        assert_eq!(statuses, statuses_after);
        // Already-pending stages keep their notes; only the marker moves.
        assert_eq!(notes, notes_after);
        assert_eq!(state.last_reopen.as_ref().unwrap().cause, "drift again");
    }
}
