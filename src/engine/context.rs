//! Stage context for an authoring turn.

use serde::Serialize;

use super::staleness::derive_live_status;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::fs::decision_files::load_decisions;
use crate::fs::documents::live_fingerprints;
use crate::fs::state_files::load_state;
use crate::gate::{blocking_items, GatePolicy};
use crate::models::issue::IssueCode;
use crate::models::stage::{StageName, StageStatus};
use crate::sections::{must_keep_sections, target_sections};

/// One upstream document as seen by the authoring agent.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamDoc {
    pub stage: StageName,
    pub status: StageStatus,
    pub fingerprint: String,
    pub exists: bool,
}

/// Everything the authoring agent needs for one stage turn.
///
/// `target_sections` is what the agent may rewrite; `must_keep_sections` is
/// the complement and must be preserved verbatim, so reopening one stage
/// does not discard unrelated manually curated content. `routing` carries
/// caller-supplied metadata through untouched.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPayload {
    pub workspace: String,
    pub stage: StageName,
    pub target_sections: Vec<String>,
    pub must_keep_sections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopen_reason: Option<String>,
    pub dependency_signature_required: bool,
    pub upstream: Vec<UpstreamDoc>,
    pub open_decision_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<serde_json::Value>,
}

impl Engine {
    /// Compute the context for authoring `stage`.
    ///
    /// Precondition: every upstream stage is completed and not stale;
    /// otherwise `UpstreamNotReady` names the first unready one.
    pub fn context(
        &self,
        name: &str,
        stage: StageName,
        routing: Option<serde_json::Value>,
    ) -> Result<ContextPayload> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.read_guard(&workspace)?;

        let state = load_state(&workspace)?;
        let live = live_fingerprints(&workspace)?;

        for dep in stage.upstream() {
            let status = derive_live_status(&state, &live, *dep);
            if status != StageStatus::Completed {
                return Err(EngineError::UpstreamNotReady {
                    stage,
                    upstream: *dep,
                    status,
                });
            }
        }

        // A reopen narrows the authoring targets only when this exact turn
        // is re-authoring content that already exists; otherwise it is a
        // full pass over the stage's section list.
        let doc_exists = workspace
            .doc_path(stage)
            .map(|path| path.exists())
            .unwrap_or(false);
        let reopened_here = state
            .last_reopen
            .as_ref()
            .map(|reopen| reopen.stage <= stage && doc_exists)
            .unwrap_or(false);
        let (reopen_reason, codes) = if reopened_here {
            let reopen = state.last_reopen.as_ref().expect("checked above");
            let codes: Vec<IssueCode> = reopen
                .codes
                .iter()
                .filter_map(|code| IssueCode::parse(code).ok())
                .collect();
            (Some(reopen.cause.clone()), codes)
        } else {
            (None, Vec::new())
        };

        let targets = target_sections(stage, &codes);
        let keeps = must_keep_sections(stage, &targets);

        let upstream = stage
            .upstream()
            .iter()
            .map(|dep| UpstreamDoc {
                stage: *dep,
                status: derive_live_status(&state, &live, *dep),
                fingerprint: live.get(dep).cloned().unwrap_or_default(),
                exists: live.contains_key(dep),
            })
            .collect();

        let decisions = load_decisions(&workspace)?;
        let open_decision_ids = blocking_items(&decisions.items, stage, GatePolicy::Strict);

        Ok(ContextPayload {
            workspace: name.to_string(),
            stage,
            target_sections: targets,
            must_keep_sections: keeps,
            reopen_reason,
            dependency_signature_required: stage.is_doc_stage() && stage != StageName::Analysis,
            upstream,
            open_decision_ids,
            routing,
        })
    }
}
