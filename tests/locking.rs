//! Writer-lock behavior surfaced through engine operations.

mod common;

use common::complete_stage;
use tempfile::TempDir;
use weft::config::{EngineConfig, LockConfig};
use weft::error::EngineError;
use weft::models::stage::StageName;
use weft::Engine;

fn impatient_engine(root: &std::path::Path) -> Engine {
    Engine::with_config(
        root,
        EngineConfig {
            lock: LockConfig {
                timeout_secs: 0.2,
                poll_ms: 10,
                stale_secs: 120.0,
            },
            ..EngineConfig::default()
        },
    )
}

#[test]
fn test_held_writer_lock_surfaces_workspace_busy() {
    let temp = TempDir::new().unwrap();
    let engine = impatient_engine(temp.path());
    engine.init("ws").unwrap();

    // Another writer: a live process (this one) holding a fresh lock.
    let lock_path = temp.path().join("ws").join("workspace.lock");
    let payload = serde_json::json!({
        "pid": std::process::id(),
        "token": "other-writer",
        "acquired_at": chrono::Utc::now(),
    });
    std::fs::write(&lock_path, payload.to_string()).unwrap();

    let err = complete_stage(&engine, "ws", StageName::Analysis, "A1").unwrap_err();
    assert!(matches!(
        err,
        EngineError::WorkspaceBusy { workspace, .. } if workspace == "ws"
    ));

    // Reads do not need the writer lock.
    engine.status("ws", false).expect("reads stay available");

    // Once the other writer releases, the same operation goes through.
    std::fs::remove_file(&lock_path).unwrap();
    complete_stage(&engine, "ws", StageName::Analysis, "A1").expect("Should complete after release");
}

#[test]
fn test_abandoned_lock_from_dead_process_is_reclaimed() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::with_config(
        temp.path(),
        EngineConfig {
            lock: LockConfig {
                timeout_secs: 1.0,
                poll_ms: 10,
                stale_secs: 0.0,
            },
            ..EngineConfig::default()
        },
    );
    engine.init("ws").unwrap();

    let lock_path = temp.path().join("ws").join("workspace.lock");
    let payload = serde_json::json!({
        "pid": u32::MAX - 1,
        "token": "crashed-writer",
        "acquired_at": chrono::Utc::now(),
    });
    std::fs::write(&lock_path, payload.to_string()).unwrap();

    complete_stage(&engine, "ws", StageName::Analysis, "A1")
        .expect("Should reclaim the abandoned lock and proceed");
}
