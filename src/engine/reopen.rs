//! Reopen cascades: manual reopens and validation-driven invalidation.

use chrono::Utc;
use std::collections::BTreeMap;

use super::staleness::derive_live_status;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::fs::documents::live_fingerprints;
use crate::fs::state_files::{load_state, save_state};
use crate::models::issue::{IssueCode, MappedIssue, ReopenDecision, ValidationIssue};
use crate::models::pipeline::ReopenSource;
use crate::models::stage::{StageName, StageStatus};

impl Engine {
    /// Reopen `stage` and everything after it. Idempotent: a second
    /// call with the same arguments only refreshes the reopen marker.
    pub fn reopen_from(&self, name: &str, stage: StageName, cause: &str) -> Result<()> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut state = load_state(&workspace)?;
        state.reopen_from(stage, cause, Vec::new(), ReopenSource::Manual, Utc::now());
        save_state(&workspace, &mut state)?;
        tracing::info!(workspace = name, stage = %stage, cause, "stages reopened");
        Ok(())
    }

    /// Apply a validation run's outcome.
    ///
    /// Zero issues completes the validation stage. Otherwise every issue
    /// code resolves through the fixed code table (an unmapped code is
    /// `UnknownStage`, never a guess), the earliest implicated stage is
    /// chosen, and one reopen cascade covers the whole batch.
    pub fn apply_validation_result(
        &self,
        name: &str,
        issues: &[ValidationIssue],
    ) -> Result<ReopenDecision> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;
        let now = Utc::now();

        if issues.is_empty() {
            // A passing verdict still requires something to have passed:
            // every document stage live-completed at this moment.
            for dep in StageName::DOC_STAGES {
                let status = derive_live_status(&state, &live, dep);
                if status != StageStatus::Completed {
                    return Err(EngineError::UpstreamNotReady {
                        stage: StageName::Validation,
                        upstream: dep,
                        status,
                    });
                }
            }
            let upstream: BTreeMap<StageName, String> = live.clone();
            state
                .record_mut(StageName::Validation)
                .complete(String::new(), upstream, "", now);
            state.current_stage = state.recommended_next_stage();
            state.updated_at = now;
            save_state(&workspace, &mut state)?;
            tracing::info!(workspace = name, "validation passed");
            return Ok(ReopenDecision {
                reopened_from: None,
                cause: "validation passed".to_string(),
                counts: BTreeMap::new(),
                issues: Vec::new(),
            });
        }

        let mut mapped = Vec::with_capacity(issues.len());
        let mut counts: BTreeMap<StageName, usize> = BTreeMap::new();
        for issue in issues {
            let code = IssueCode::parse(&issue.code)?;
            let stage = code.stage();
            *counts.entry(stage).or_insert(0) += 1;
            mapped.push(MappedIssue {
                code: code.as_str().to_string(),
                stage,
                summary: issue.summary.clone(),
            });
        }

        // counts is keyed by StageName, so the first key is the earliest
        // implicated stage in pipeline order.
        let reopened_from = *counts.keys().next().expect("at least one issue");
        let breakdown = counts
            .iter()
            .map(|(stage, count)| format!("{stage}:{count}"))
            .collect::<Vec<_>>()
            .join(", ");
        let cause = format!("validation reopen ({breakdown})");
        let codes: Vec<String> = mapped.iter().map(|issue| issue.code.clone()).collect();

        state.reopen_from(reopened_from, &cause, codes, ReopenSource::Validation, now);
        let record = state.record_mut(StageName::Validation);
        record.status = StageStatus::Failed;
        record.notes = cause.clone();
        record.updated_at = now;
        state.current_stage = state.recommended_next_stage();
        state.updated_at = now;
        save_state(&workspace, &mut state)?;

        tracing::warn!(
            workspace = name,
            reopened_from = %reopened_from,
            issue_count = issues.len(),
            "validation failed, stages reopened"
        );
        Ok(ReopenDecision {
            reopened_from: Some(reopened_from),
            cause,
            counts,
            issues: mapped,
        })
    }
}
