//! Structured validation issue codes and their fixed mapping to stages.
//!
//! The code table is exhaustive by construction: an unknown code string is an
//! `UnknownStage` error, never a guess. Keyword inference over issue text is
//! deliberately absent so the mapping survives content and language changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stage::StageName;
use crate::error::EngineError;

/// Every issue code the validation step may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueCode {
    AnalysisPlaceholders,
    AnalysisCoverageMissingMatrix,
    AnalysisTooThin,
    PrdPlaceholders,
    PrdTechDetail,
    PrdTooThin,
    TechPlaceholders,
    TechMissingRollback,
    TechSchemaConflict,
    TechTooThin,
    AcceptancePlaceholders,
    AcceptanceMissingRidToAid,
    AcceptanceOrphanRids,
    AcceptanceTooThin,
    GlobalPlaceholders,
    GlobalSignatureDrift,
}

impl IssueCode {
    const TABLE: [(IssueCode, &'static str, StageName); 16] = [
        (IssueCode::AnalysisPlaceholders, "analysis.placeholders", StageName::Analysis),
        (
            IssueCode::AnalysisCoverageMissingMatrix,
            "analysis.coverage.missing_matrix",
            StageName::Analysis,
        ),
        (IssueCode::AnalysisTooThin, "analysis.too_thin", StageName::Analysis),
        (IssueCode::PrdPlaceholders, "prd.placeholders", StageName::Prd),
        (IssueCode::PrdTechDetail, "prd.tech_detail", StageName::Prd),
        (IssueCode::PrdTooThin, "prd.too_thin", StageName::Prd),
        (IssueCode::TechPlaceholders, "tech.placeholders", StageName::Tech),
        (IssueCode::TechMissingRollback, "tech.missing_rollback", StageName::Tech),
        (IssueCode::TechSchemaConflict, "tech.schema_conflict", StageName::Tech),
        (IssueCode::TechTooThin, "tech.too_thin", StageName::Tech),
        (
            IssueCode::AcceptancePlaceholders,
            "acceptance.placeholders",
            StageName::Acceptance,
        ),
        (
            IssueCode::AcceptanceMissingRidToAid,
            "acceptance.traceability.missing_rid_to_aid",
            StageName::Acceptance,
        ),
        (
            IssueCode::AcceptanceOrphanRids,
            "acceptance.traceability.orphan_rids",
            StageName::Acceptance,
        ),
        (IssueCode::AcceptanceTooThin, "acceptance.too_thin", StageName::Acceptance),
        // Global issues reopen the pipeline from the top.
        (IssueCode::GlobalPlaceholders, "global.placeholders", StageName::Analysis),
        (IssueCode::GlobalSignatureDrift, "global.signature_drift", StageName::Analysis),
    ];

    /// The stage this code reopens.
    pub fn stage(self) -> StageName {
        Self::TABLE
            .iter()
            .find(|(code, _, _)| *code == self)
            .map(|(_, _, stage)| *stage)
            .unwrap_or(StageName::Analysis)
    }

    pub fn as_str(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(code, _, _)| *code == self)
            .map(|(_, text, _)| *text)
            .unwrap_or("global.placeholders")
    }

    /// Resolve a code string against the fixed table.
    pub fn parse(text: &str) -> Result<IssueCode, EngineError> {
        let normalized = text.trim().to_lowercase();
        Self::TABLE
            .iter()
            .find(|(_, candidate, _)| *candidate == normalized)
            .map(|(code, _, _)| *code)
            .ok_or(EngineError::UnknownStage { name: normalized })
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One defect reported by the validation step.
///
/// The code is kept as a string at this boundary; `apply_validation_result`
/// resolves it against the table and rejects unknown codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: String,
    pub summary: String,
    #[serde(default)]
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(code: &str, summary: &str) -> Self {
        Self {
            code: code.to_string(),
            summary: summary.to_string(),
            detail: String::new(),
        }
    }
}

/// An issue after table lookup, carried in the reopen decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappedIssue {
    pub code: String,
    pub stage: StageName,
    pub summary: String,
}

/// Outcome of applying a validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenDecision {
    /// Earliest reopened stage; `None` when validation passed.
    pub reopened_from: Option<StageName>,
    pub cause: String,
    /// Issue counts per implicated stage.
    pub counts: BTreeMap<StageName, usize>,
    pub issues: Vec<MappedIssue>,
}
