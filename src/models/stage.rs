use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

/// A stage in the fixed document pipeline.
///
/// The declaration order is the pipeline order: each document stage depends
/// on every stage declared before it, and `Validation` closes the pipeline
/// without producing a document of its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// Requirement analysis document.
    Analysis,
    /// Product requirements document.
    Prd,
    /// Technical design document.
    Tech,
    /// Acceptance criteria document.
    Acceptance,
    /// Cross-document validation step; no document, only a verdict.
    Validation,
}

impl StageName {
    /// All stages in pipeline order.
    pub const ORDER: [StageName; 5] = [
        StageName::Analysis,
        StageName::Prd,
        StageName::Tech,
        StageName::Acceptance,
        StageName::Validation,
    ];

    /// The document-producing stages, in pipeline order.
    pub const DOC_STAGES: [StageName; 4] = [
        StageName::Analysis,
        StageName::Prd,
        StageName::Tech,
        StageName::Acceptance,
    ];

    /// Zero-based position in the pipeline order.
    pub fn position(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Upstream stages this stage depends on (everything before it).
    pub fn upstream(self) -> &'static [StageName] {
        &Self::ORDER[..self.position()]
    }

    /// Stages strictly after this one in pipeline order.
    pub fn downstream(self) -> &'static [StageName] {
        &Self::ORDER[self.position() + 1..]
    }

    /// Whether this stage produces a document.
    pub fn is_doc_stage(self) -> bool {
        self != StageName::Validation
    }

    /// Order-prefixed document filename, `None` for the validation stage.
    pub fn doc_file_name(self) -> Option<&'static str> {
        match self {
            StageName::Analysis => Some("01-analysis.md"),
            StageName::Prd => Some("02-prd.md"),
            StageName::Tech => Some("03-tech.md"),
            StageName::Acceptance => Some("04-acceptance.md"),
            StageName::Validation => None,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageName::Analysis => write!(f, "analysis"),
            StageName::Prd => write!(f, "prd"),
            StageName::Tech => write!(f, "tech"),
            StageName::Acceptance => write!(f, "acceptance"),
            StageName::Validation => write!(f, "validation"),
        }
    }
}

impl std::str::FromStr for StageName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Ok(StageName::Analysis),
            "prd" => Ok(StageName::Prd),
            "tech" => Ok(StageName::Tech),
            "acceptance" => Ok(StageName::Acceptance),
            "validation" => Ok(StageName::Validation),
            other => Err(EngineError::UnknownStage {
                name: other.to_string(),
            }),
        }
    }
}

/// Status of a stage in the pipeline lifecycle.
///
/// State machine:
/// - `Pending` → `InProgress` → `Completed`
/// - `Completed` → `Pending` (reopen, staleness normalization)
/// - `Failed` is reachable only for the validation stage and always leads
///   back to `Pending` on the reopened document stages
/// - `Stale` is derived on read and never persisted; normalization persists
///   `Pending` instead
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not yet authored, or reopened for re-authoring.
    Pending,
    /// An agent is actively authoring this stage.
    InProgress,
    /// Authored and signature-verified.
    Completed,
    /// Completed, but recorded fingerprints no longer match live content.
    Stale,
    /// Validation ran and reported issues.
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::InProgress => write!(f, "in_progress"),
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Stale => write!(f, "stale"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-stage completion state.
///
/// The recorded fingerprints capture what was true of the upstream documents
/// at the moment this stage was last completed; they are compared against
/// live fingerprints on every read to derive staleness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    /// Fingerprint of this stage's own document at last completion.
    #[serde(default)]
    pub doc_fingerprint: String,
    /// Fingerprints of upstream documents at last completion.
    #[serde(default)]
    pub upstream_fingerprints: BTreeMap<StageName, String>,
    /// Identifier of the agent that last completed or started the stage.
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl StageRecord {
    pub fn new(stage: StageName, now: DateTime<Utc>) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            doc_fingerprint: String::new(),
            upstream_fingerprints: BTreeMap::new(),
            agent: String::new(),
            notes: String::new(),
            updated_at: now,
        }
    }

    /// Mark the stage completed with the fingerprints observed at completion.
    pub fn complete(
        &mut self,
        doc_fingerprint: String,
        upstream_fingerprints: BTreeMap<StageName, String>,
        agent: &str,
        now: DateTime<Utc>,
    ) {
        self.status = StageStatus::Completed;
        self.doc_fingerprint = doc_fingerprint;
        self.upstream_fingerprints = upstream_fingerprints;
        self.agent = agent.to_string();
        self.updated_at = now;
    }

    /// Send the stage back to pending, clearing recorded fingerprints and
    /// prepending the cause to the notes trail.
    pub fn reopen(&mut self, cause: &str, now: DateTime<Utc>) {
        self.status = StageStatus::Pending;
        self.doc_fingerprint.clear();
        self.upstream_fingerprints.clear();
        self.updated_at = now;
        let old = self.notes.trim();
        self.notes = if old.is_empty() {
            cause.to_string()
        } else {
            format!("{cause}; {old}")
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_order_is_total() {
        assert!(StageName::Analysis < StageName::Prd);
        assert!(StageName::Prd < StageName::Tech);
        assert!(StageName::Tech < StageName::Acceptance);
        assert!(StageName::Acceptance < StageName::Validation);
    }

    #[test]
    fn upstream_of_tech_is_analysis_and_prd() {
        assert_eq!(
            StageName::Tech.upstream(),
            &[StageName::Analysis, StageName::Prd]
        );
    }

    #[test]
    fn validation_depends_on_all_doc_stages() {
        assert_eq!(StageName::Validation.upstream(), &StageName::DOC_STAGES);
    }

    #[test]
    fn unknown_stage_name_is_rejected() {
        let err = StageName::from_str("design").unwrap_err();
        assert!(matches!(err, EngineError::UnknownStage { name } if name == "design"));
    }

    #[test]
    fn reopen_accumulates_notes() {
        let now = Utc::now();
        let mut record = StageRecord::new(StageName::Prd, now);
        record.notes = "first pass".to_string();
        record.reopen("upstream drift", now);
        assert_eq!(record.status, StageStatus::Pending);
        assert_eq!(record.notes, "upstream drift; first pass");
        assert!(record.upstream_fingerprints.is_empty());
    }
}
