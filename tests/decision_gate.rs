//! Decision-gate enforcement and the resolution-driven staleness cascade.

mod common;

use common::{complete_stage, complete_stage_with_policy, engine};
use tempfile::TempDir;
use weft::error::EngineError;
use weft::gate::GatePolicy;
use weft::models::decision::{NewDecisionItem, Priority};
use weft::models::stage::{StageName, StageStatus};

fn open_item(stage: Option<StageName>, question: &str) -> NewDecisionItem {
    NewDecisionItem {
        stage,
        question: question.to_string(),
        priority: Priority::High,
        affected_sections: Vec::new(),
    }
}

#[test]
fn test_strict_blocks_and_lenient_passes() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();

    let item = engine
        .add_item("ws", open_item(Some(StageName::Prd), "retention period?"))
        .unwrap();

    let err = complete_stage(&engine, "ws", StageName::Prd, "# PRD\n").unwrap_err();
    match err {
        EngineError::DecisionGateBlocked { stage, item_ids } => {
            assert_eq!(stage, StageName::Prd);
            assert_eq!(item_ids, vec![item.id.clone()]);
        }
        other => panic!("expected DecisionGateBlocked, got {other}"),
    }

    complete_stage_with_policy(&engine, "ws", StageName::Prd, "# PRD\n", GatePolicy::Lenient)
        .expect("lenient policy should not block");
}

#[test]
fn test_item_owned_by_earlier_stage_blocks_later_stages() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    engine
        .add_item("ws", open_item(Some(StageName::Analysis), "which tenant?"))
        .unwrap();

    // The analysis-owned question gates analysis itself...
    let err = complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap_err();
    assert!(matches!(err, EngineError::DecisionGateBlocked { .. }));

    // ...and once resolved, the pipeline proceeds.
    engine.resolve_item("ws", "D-1", "tenant A only").unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();
    complete_stage(&engine, "ws", StageName::Prd, "# PRD\n").unwrap();
}

#[test]
fn test_resolution_cascades_staleness_below_owning_stage() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap();
    engine
        .add_item("ws", open_item(Some(StageName::Prd), "retention period?"))
        .unwrap();
    complete_stage_with_policy(&engine, "ws", StageName::Prd, "# PRD\n", GatePolicy::Lenient)
        .unwrap();
    // The open prd item also gates tech under strict policy, so the preview
    // pass goes through lenient.
    complete_stage_with_policy(&engine, "ws", StageName::Tech, "# tech\n", GatePolicy::Lenient)
        .unwrap();

    // Resolving rewrites the prd document's decisions block, so prd's
    // fingerprint changes and tech (which recorded the old one) goes stale.
    // Prd itself stays completed: the engine made the edit and keeps the
    // record's own fingerprint in step.
    engine.resolve_item("ws", "D-1", "90 days").unwrap();

    assert_eq!(
        engine.live_status("ws", StageName::Prd).unwrap(),
        StageStatus::Completed
    );
    assert_eq!(
        engine.live_status("ws", StageName::Tech).unwrap(),
        StageStatus::Stale
    );

    // The resolution is visible in the prd document.
    let prd = engine.read_document("ws", StageName::Prd).unwrap().unwrap();
    assert!(prd.contains("[confirmed] D-1"));
    assert!(prd.contains("90 days"));
}

#[test]
fn test_resolving_twice_is_idempotent_overwrite() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    engine.add_item("ws", open_item(None, "scope?")).unwrap();
    engine.resolve_item("ws", "D-1", "first answer").unwrap();
    let again = engine.resolve_item("ws", "D-1", "second answer").unwrap();
    assert_eq!(again.resolution, "second answer");
}

#[test]
fn test_unknown_item_id_is_rejected() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    let err = engine.resolve_item("ws", "D-99", "answer").unwrap_err();
    assert!(matches!(err, EngineError::UnknownItem { id } if id == "D-99"));
}

#[test]
fn test_list_open_items_scopes_by_stage() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path());
    engine.init("ws").unwrap();

    engine
        .add_item("ws", open_item(Some(StageName::Analysis), "scope?"))
        .unwrap();
    engine
        .add_item("ws", open_item(Some(StageName::Acceptance), "rollout gate?"))
        .unwrap();
    engine.add_item("ws", open_item(None, "tenant?")).unwrap();

    let all = engine.list_open_items("ws", None).unwrap();
    assert_eq!(all.len(), 3);

    // Scope analysis: the acceptance-owned item is not yet in play, but the
    // pipeline-wide item is.
    let scoped = engine.list_open_items("ws", Some(StageName::Analysis)).unwrap();
    let ids: Vec<&str> = scoped.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["D-1", "D-3"]);

    engine.resolve_item("ws", "D-1", "resolved").unwrap();
    let remaining = engine.list_open_items("ws", Some(StageName::Analysis)).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "D-3");
}
