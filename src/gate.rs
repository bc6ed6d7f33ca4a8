//! Decision gate: unresolved decision items and whether they block a stage.
//!
//! Decisions owned by a stage are mirrored into that stage's document inside
//! the decisions block below, so a resolution changes the owning document's
//! fingerprint and staleness cascades downstream without any extra wiring.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::decision::{DecisionItem, DecisionStatus};
use crate::models::stage::StageName;

pub const DECISIONS_START: &str = "<!-- DECISIONS:START -->";
pub const DECISIONS_END: &str = "<!-- DECISIONS:END -->";

/// Gate strictness selected by the caller per operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    /// Any open item at or above the completing stage blocks.
    #[default]
    Strict,
    /// Never blocks; used for preview and dry-run flows.
    Lenient,
}

impl std::str::FromStr for GatePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(GatePolicy::Strict),
            "lenient" => Ok(GatePolicy::Lenient),
            other => anyhow::bail!("invalid gate policy: {other} (allowed: strict, lenient)"),
        }
    }
}

/// Ids of the items that block completion of `stage` under `policy`.
///
/// An open item blocks every stage at or after its owning stage; an item
/// with no owning stage is a pipeline-wide question and blocks everything.
pub fn blocking_items(items: &[DecisionItem], stage: StageName, policy: GatePolicy) -> Vec<String> {
    if policy == GatePolicy::Lenient {
        return Vec::new();
    }
    items
        .iter()
        .filter(|item| item.status == DecisionStatus::Open)
        .filter(|item| match item.stage {
            Some(owner) => owner <= stage,
            None => true,
        })
        .map(|item| item.id.clone())
        .collect()
}

/// Error-or-pass wrapper used on the completion path.
pub fn check_gate(items: &[DecisionItem], stage: StageName, policy: GatePolicy) -> Result<()> {
    let item_ids = blocking_items(items, stage, policy);
    if item_ids.is_empty() {
        Ok(())
    } else {
        Err(EngineError::DecisionGateBlocked { stage, item_ids })
    }
}

fn render_block(items: &[&DecisionItem]) -> String {
    let mut block = String::from(DECISIONS_START);
    block.push('\n');
    for item in items {
        let line = match item.status {
            DecisionStatus::Open => {
                format!("- [open] {} ({}): {}\n", item.id, item.priority, item.question)
            }
            DecisionStatus::Confirmed => format!(
                "- [confirmed] {} ({}): {} => {}\n",
                item.id, item.priority, item.question, item.resolution
            ),
        };
        block.push_str(&line);
    }
    block.push_str(DECISIONS_END);
    block
}

/// Replace or append the decisions block in a stage document.
///
/// Same marker discipline as the signature block: at most one pair, replaced
/// in place, appended when absent.
pub fn embed_decisions(content: &str, items: &[&DecisionItem]) -> Result<String> {
    let block = render_block(items);
    let starts: Vec<usize> = content.match_indices(DECISIONS_START).map(|(i, _)| i).collect();
    let ends: Vec<usize> = content.match_indices(DECISIONS_END).map(|(i, _)| i).collect();

    match (starts.len(), ends.len()) {
        (0, 0) => {
            if content.is_empty() {
                return Ok(format!("{block}\n"));
            }
            let separator = if content.ends_with('\n') { "\n" } else { "\n\n" };
            Ok(format!("{content}{separator}{block}\n"))
        }
        (1, 1) if starts[0] <= ends[0] => {
            let mut out = String::with_capacity(content.len() + block.len());
            out.push_str(&content[..starts[0]]);
            out.push_str(&block);
            out.push_str(&content[ends[0] + DECISIONS_END.len()..]);
            Ok(out)
        }
        _ => Err(anyhow::anyhow!("broken decisions block markers in document").into()),
    }
}
