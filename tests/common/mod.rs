//! Shared helpers for integration tests.

use std::collections::BTreeMap;

use weft::config::EngineConfig;
use weft::engine::CompletionAck;
use weft::error::Result;
use weft::gate::GatePolicy;
use weft::models::stage::StageName;
use weft::signature::embed_signature;
use weft::Engine;

pub fn engine(root: &std::path::Path) -> Engine {
    Engine::with_config(root, EngineConfig::default())
}

/// Complete a stage the way the authoring agent would: fetch the context,
/// embed the live upstream fingerprints, submit.
pub fn complete_stage(
    engine: &Engine,
    workspace: &str,
    stage: StageName,
    body: &str,
) -> Result<CompletionAck> {
    complete_stage_with_policy(engine, workspace, stage, body, GatePolicy::Strict)
}

pub fn complete_stage_with_policy(
    engine: &Engine,
    workspace: &str,
    stage: StageName,
    body: &str,
    policy: GatePolicy,
) -> Result<CompletionAck> {
    let context = engine.context(workspace, stage, None)?;
    let mapping: BTreeMap<StageName, String> = context
        .upstream
        .iter()
        .map(|doc| (doc.stage, doc.fingerprint.clone()))
        .collect();
    let content = if stage == StageName::Analysis {
        body.to_string()
    } else {
        embed_signature(body, &mapping)?
    };
    engine.complete_stage(workspace, stage, &content, "test-agent", policy)
}

/// Complete every document stage with placeholder content.
pub fn complete_all_doc_stages(engine: &Engine, workspace: &str) {
    for stage in StageName::DOC_STAGES {
        complete_stage(engine, workspace, stage, &format!("# {stage}\n\nbody\n"))
            .unwrap_or_else(|e| panic!("should complete {stage}: {e}"));
    }
}
