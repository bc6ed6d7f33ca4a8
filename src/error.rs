//! Typed error taxonomy for the pipeline engine.
//!
//! Every variant carries enough context for the caller to act without
//! re-deriving state: the stage involved, the offending fingerprint pair, or
//! the blocking item ids. The filesystem layer reports through the
//! transparent `Storage` variant.

use thiserror::Error;

use crate::models::stage::{StageName, StageStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    /// An upstream stage must be completed (and fresh) first.
    #[error("stage {stage} blocked: upstream {upstream} is {status}")]
    UpstreamNotReady {
        stage: StageName,
        upstream: StageName,
        status: StageStatus,
    },

    /// Authored content did not incorporate the upstream version it claims to.
    #[error(
        "dependency signature mismatch in {stage}: {upstream} expected {expected}, found {}",
        found.as_deref().unwrap_or("<missing>")
    )]
    SignatureMismatch {
        stage: StageName,
        upstream: StageName,
        expected: String,
        found: Option<String>,
    },

    /// A signature block exists but cannot be parsed; regenerate it.
    #[error("malformed dependency signature block: {reason}")]
    MalformedSignature { reason: String },

    /// Stage (or issue code) not in the known pipeline order.
    #[error("unknown stage: {name}")]
    UnknownStage { name: String },

    /// The workspace writer lock could not be acquired in time.
    #[error("workspace '{workspace}' is busy: lock not acquired within {waited_secs:.1}s")]
    WorkspaceBusy { workspace: String, waited_secs: f64 },

    /// Unresolved decision items block the stage under strict policy.
    #[error("stage {stage} blocked by unresolved decision items: {}", item_ids.join(", "))]
    DecisionGateBlocked {
        stage: StageName,
        item_ids: Vec<String>,
    },

    /// The requested status change is not part of the state machine.
    #[error("invalid transition for {stage}: {from} -> {to}")]
    InvalidTransition {
        stage: StageName,
        from: StageStatus,
        to: StageStatus,
    },

    /// The workspace has no pipeline state yet; run init first.
    #[error("workspace '{workspace}' is not initialized")]
    WorkspaceNotInitialized { workspace: String },

    /// No decision item with this id.
    #[error("unknown decision item: {id}")]
    UnknownItem { id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
