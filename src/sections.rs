//! Per-stage section contracts handed to the authoring agent.
//!
//! Each stage document has a fixed section list. On a first authoring pass
//! the whole list is in play; on a reopen the targets narrow to the sections
//! implicated by the issue codes that drove the reopen, and everything else
//! must be preserved verbatim. Structural marker blocks are always kept.

use crate::gate::{DECISIONS_END, DECISIONS_START};
use crate::models::issue::IssueCode;
use crate::models::stage::StageName;
use crate::signature::{SIGNATURE_END, SIGNATURE_START};

const ANALYSIS_SECTIONS: &[&str] = &[
    "## Original Requirement",
    "## Context",
    "## Current State",
    "## Coverage Matrix",
    "## Risks",
    "## Conclusion",
];

const PRD_SECTIONS: &[&str] = &[
    "## Goals",
    "## User Stories",
    "## Functional Requirements",
    "## Non-functional Requirements",
    "## Out of Scope",
];

const TECH_SECTIONS: &[&str] = &[
    "## Architecture",
    "## Data Model",
    "## Interfaces",
    "## Migration & Rollback",
    "## Risks",
];

const ACCEPTANCE_SECTIONS: &[&str] = &[
    "## Acceptance Checklist",
    "## Acceptance Plans",
    "## Traceability",
];

/// The full section list for a stage document.
pub fn stage_sections(stage: StageName) -> &'static [&'static str] {
    match stage {
        StageName::Analysis => ANALYSIS_SECTIONS,
        StageName::Prd => PRD_SECTIONS,
        StageName::Tech => TECH_SECTIONS,
        StageName::Acceptance => ACCEPTANCE_SECTIONS,
        StageName::Validation => &[],
    }
}

/// Sections always preserved verbatim regardless of targeting: the source
/// requirement text and the machine-managed marker blocks.
fn structural_keeps(stage: StageName) -> Vec<String> {
    let mut keeps = Vec::new();
    if stage == StageName::Analysis {
        keeps.push("## Original Requirement".to_string());
    }
    if stage.is_doc_stage() && stage != StageName::Analysis {
        keeps.push(SIGNATURE_START.to_string());
        keeps.push(SIGNATURE_END.to_string());
    }
    if stage.is_doc_stage() {
        keeps.push(DECISIONS_START.to_string());
        keeps.push(DECISIONS_END.to_string());
    }
    keeps
}

/// Sections within the code's stage implicated by the code.
///
/// An empty slice means the whole document is implicated and targeting does
/// not narrow.
fn implicated_sections(code: IssueCode) -> &'static [&'static str] {
    match code {
        IssueCode::AnalysisCoverageMissingMatrix => &["## Coverage Matrix"],
        IssueCode::PrdTechDetail => &[
            "## Functional Requirements",
            "## Non-functional Requirements",
        ],
        IssueCode::TechMissingRollback => &["## Migration & Rollback"],
        IssueCode::TechSchemaConflict => &["## Data Model"],
        IssueCode::AcceptanceMissingRidToAid | IssueCode::AcceptanceOrphanRids => {
            &["## Traceability", "## Acceptance Checklist"]
        }
        _ => &[],
    }
}

/// Authoring targets for `stage` given the codes recorded on the reopen that
/// put it back to pending. With no codes for this stage (first pass, or a
/// cascade from upstream), the full section list is in play.
pub fn target_sections(stage: StageName, codes: &[IssueCode]) -> Vec<String> {
    let full: Vec<String> = stage_sections(stage).iter().map(|s| s.to_string()).collect();
    let own_codes: Vec<IssueCode> = codes
        .iter()
        .copied()
        .filter(|code| code.stage() == stage)
        .collect();
    if own_codes.is_empty() {
        return full;
    }

    let mut narrowed: Vec<String> = Vec::new();
    for code in &own_codes {
        let sections = implicated_sections(*code);
        if sections.is_empty() {
            // Whole document implicated; no narrowing possible.
            return full;
        }
        for section in sections {
            if !narrowed.iter().any(|s| s == section) {
                narrowed.push(section.to_string());
            }
        }
    }
    narrowed
}

/// Everything outside the targets must be preserved verbatim: the complement
/// of the target list plus the structural marker blocks.
pub fn must_keep_sections(stage: StageName, targets: &[String]) -> Vec<String> {
    let mut keeps: Vec<String> = stage_sections(stage)
        .iter()
        .filter(|section| !targets.iter().any(|t| t == *section))
        .map(|s| s.to_string())
        .collect();
    for keep in structural_keeps(stage) {
        if !keeps.contains(&keep) {
            keeps.push(keep);
        }
    }
    keeps
}
