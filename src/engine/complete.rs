//! Stage completion: the signature-verified write path.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use super::staleness::derive_live_status;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::fs::decision_files::load_decisions;
use crate::fs::documents::{live_fingerprints, write_document};
use crate::fs::state_files::{load_state, save_state};
use crate::fs::WorkspaceDir;
use crate::gate::{check_gate, GatePolicy};
use crate::models::pipeline::PipelineState;
use crate::models::stage::{StageName, StageStatus};
use crate::signature::{extract_signature, fingerprint};

/// Returned on successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionAck {
    pub workspace: String,
    pub stage: StageName,
    pub doc_fingerprint: String,
    pub recorded_upstream: BTreeMap<StageName, String>,
    pub next_stage: StageName,
}

/// Every upstream stage must be live-completed (completed and not stale).
fn require_upstream_ready(
    state: &PipelineState,
    live: &BTreeMap<StageName, String>,
    stage: StageName,
) -> Result<()> {
    for dep in stage.upstream() {
        let status = derive_live_status(state, live, *dep);
        if status != StageStatus::Completed {
            return Err(EngineError::UpstreamNotReady {
                stage,
                upstream: *dep,
                status,
            });
        }
    }
    Ok(())
}

/// The authored content must carry a signature mapping exactly equal to the
/// live upstream fingerprints: same stages, same digests, nothing extra.
fn verify_signature(
    stage: StageName,
    content: &str,
    expected: &BTreeMap<StageName, String>,
) -> Result<()> {
    let found = extract_signature(content)?.unwrap_or_default();

    for (dep, expected_digest) in expected {
        match found.get(dep) {
            Some(digest) if digest == expected_digest => {}
            other => {
                return Err(EngineError::SignatureMismatch {
                    stage,
                    upstream: *dep,
                    expected: expected_digest.clone(),
                    found: other.cloned(),
                })
            }
        }
    }
    if let Some((extra, digest)) = found.iter().find(|(dep, _)| !expected.contains_key(*dep)) {
        return Err(EngineError::SignatureMismatch {
            stage,
            upstream: *extra,
            expected: String::new(),
            found: Some(digest.clone()),
        });
    }
    Ok(())
}

impl Engine {
    /// Mark a stage as actively being authored.
    pub fn start_stage(&self, name: &str, stage: StageName, agent: &str) -> Result<()> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;
        require_upstream_ready(&state, &live, stage)?;

        let now = Utc::now();
        let record = state.record_mut(stage);
        record.status = StageStatus::InProgress;
        record.agent = agent.to_string();
        record.updated_at = now;
        state.current_stage = stage;
        state.updated_at = now;
        save_state(&workspace, &mut state)?;
        tracing::debug!(workspace = name, stage = %stage, agent, "stage started");
        Ok(())
    }

    /// Accept a completion report from the authoring agent.
    ///
    /// Preconditions, in order: the stage produces a document, all upstream
    /// stages are live-completed (no skipping), no decision item blocks
    /// under the chosen policy, and for every stage after analysis the embedded
    /// dependency signature equals the live upstream fingerprints exactly.
    /// On any failure the stage record is untouched.
    pub fn complete_stage(
        &self,
        name: &str,
        stage: StageName,
        content: &str,
        agent: &str,
        policy: GatePolicy,
    ) -> Result<CompletionAck> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;
        self.complete_stage_locked(&workspace, stage, content, agent, policy)
    }

    fn complete_stage_locked(
        &self,
        workspace: &WorkspaceDir,
        stage: StageName,
        content: &str,
        agent: &str,
        policy: GatePolicy,
    ) -> Result<CompletionAck> {
        let mut state = load_state(workspace)?;

        if !stage.is_doc_stage() {
            // Validation completes only through apply_validation_result,
            // which is the operation that proves there were zero issues.
            return Err(EngineError::InvalidTransition {
                stage,
                from: state.record(stage).status,
                to: StageStatus::Completed,
            });
        }

        let live = live_fingerprints(workspace)?;
        require_upstream_ready(&state, &live, stage)?;

        let decisions = load_decisions(workspace)?;
        check_gate(&decisions.items, stage, policy)?;

        let expected: BTreeMap<StageName, String> = stage
            .upstream()
            .iter()
            .filter_map(|dep| live.get(dep).map(|digest| (*dep, digest.clone())))
            .collect();
        if stage != StageName::Analysis {
            verify_signature(stage, content, &expected)?;
        }

        write_document(workspace, stage, content)?;
        let doc_fingerprint = fingerprint(content);
        let now = Utc::now();
        state
            .record_mut(stage)
            .complete(doc_fingerprint.clone(), expected.clone(), agent, now);
        state.current_stage = state.recommended_next_stage();
        state.updated_at = now;
        save_state(workspace, &mut state)?;

        tracing::info!(
            workspace = workspace.name(),
            stage = %stage,
            agent,
            "stage completed"
        );
        Ok(CompletionAck {
            workspace: workspace.name().to_string(),
            stage,
            doc_fingerprint,
            recorded_upstream: expected,
            next_stage: state.current_stage,
        })
    }

    /// Record a failed validation verdict without structured issues.
    ///
    /// Only the validation stage can fail; a defect in a document stage is a
    /// reopen, not a failure.
    pub fn fail_stage(&self, name: &str, stage: StageName, notes: &str) -> Result<()> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut state = load_state(&workspace)?;
        if stage != StageName::Validation {
            return Err(EngineError::InvalidTransition {
                stage,
                from: state.record(stage).status,
                to: StageStatus::Failed,
            });
        }

        let now = Utc::now();
        let record = state.record_mut(stage);
        record.status = StageStatus::Failed;
        record.notes = notes.to_string();
        record.updated_at = now;
        state.updated_at = now;
        save_state(&workspace, &mut state)?;
        tracing::warn!(workspace = name, notes, "validation failed");
        Ok(())
    }
}
