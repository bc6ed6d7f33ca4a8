//! Ordering preconditions and signature verification on the completion path.

mod common;

use common::{complete_stage, engine};
use std::collections::BTreeMap;
use tempfile::TempDir;
use weft::error::EngineError;
use weft::gate::GatePolicy;
use weft::models::stage::{StageName, StageStatus};
use weft::signature::{embed_signature, SIGNATURE_START};

#[test]
fn test_completing_out_of_order_names_first_unready_upstream() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    let err = engine
        .complete_stage("ws", StageName::Tech, "content", "agent", GatePolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UpstreamNotReady {
            stage: StageName::Tech,
            upstream: StageName::Analysis,
            status: StageStatus::Pending,
        }
    ));
}

#[test]
fn test_stale_upstream_blocks_completion() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();
    engine.write_document("ws", StageName::Analysis, "A2").unwrap();

    // Analysis is completed-but-stale: prd must not build on it.
    let err = engine
        .complete_stage("ws", StageName::Prd, "content", "agent", GatePolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UpstreamNotReady {
            upstream: StageName::Analysis,
            status: StageStatus::Stale,
            ..
        }
    ));
}

#[test]
fn test_missing_signature_block_is_a_mismatch() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();

    let err = engine
        .complete_stage("ws", StageName::Prd, "# PRD\n\nno block\n", "agent", GatePolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::SignatureMismatch {
            stage: StageName::Prd,
            upstream: StageName::Analysis,
            found: None,
            ..
        }
    ));
    // The stage record is untouched by the failed completion.
    assert_eq!(
        engine.live_status("ws", StageName::Prd).unwrap(),
        StageStatus::Pending
    );
}

#[test]
fn test_wrong_fingerprint_is_a_mismatch_with_the_offending_pair() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();

    let mut stale_mapping = BTreeMap::new();
    stale_mapping.insert(StageName::Analysis, "deadbeef".to_string());
    let content = embed_signature("# PRD\n", &stale_mapping).unwrap();

    let err = engine
        .complete_stage("ws", StageName::Prd, &content, "agent", GatePolicy::Strict)
        .unwrap_err();
    match err {
        EngineError::SignatureMismatch {
            upstream, expected, found, ..
        } => {
            assert_eq!(upstream, StageName::Analysis);
            assert_eq!(found.as_deref(), Some("deadbeef"));
            assert_ne!(expected, "deadbeef");
        }
        other => panic!("expected SignatureMismatch, got {other}"),
    }
}

#[test]
fn test_malformed_signature_block_is_recoverable() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();

    let content = format!("# PRD\n\n{SIGNATURE_START}\n- analysis: abc\n");
    let err = engine
        .complete_stage("ws", StageName::Prd, &content, "agent", GatePolicy::Strict)
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedSignature { .. }));
}

#[test]
fn test_validation_cannot_complete_through_the_document_path() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    let err = engine
        .complete_stage("ws", StageName::Validation, "", "agent", GatePolicy::Strict)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[test]
fn test_fail_stage_is_validation_only() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    let err = engine.fail_stage("ws", StageName::Prd, "broke").unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            stage: StageName::Prd,
            to: StageStatus::Failed,
            ..
        }
    ));

    engine.fail_stage("ws", StageName::Validation, "external verdict").unwrap();
    assert_eq!(
        engine.live_status("ws", StageName::Validation).unwrap(),
        StageStatus::Failed
    );
}

#[test]
fn test_operations_on_uninitialized_workspace_fail_cleanly() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());

    let err = engine.status("nope", false).unwrap_err();
    assert!(matches!(
        err,
        EngineError::WorkspaceNotInitialized { workspace } if workspace == "nope"
    ));
}
