//! Decision items: open questions that gate confident stage completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::StageName;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    /// Waiting for a human to resolve.
    Open,
    /// Resolved; the resolution text is authoritative.
    Confirmed,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionStatus::Open => write!(f, "open"),
            DecisionStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// An open question blocking confident completion of a stage.
///
/// Items owned by a stage are mirrored into that stage's document inside the
/// decisions block, so resolving one changes the stage fingerprint and
/// cascades staleness downstream. Items are never deleted, only confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionItem {
    /// Sequential identifier, `D-1`, `D-2`, …
    pub id: String,
    /// Owning stage; `None` gates the whole pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    pub status: DecisionStatus,
    pub question: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub affected_sections: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a decision item; the engine assigns id and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDecisionItem {
    #[serde(default)]
    pub stage: Option<StageName>,
    pub question: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub affected_sections: Vec<String>,
}

/// The persisted decision-item table for one workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionTable {
    #[serde(default)]
    pub items: Vec<DecisionItem>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DecisionTable {
    /// Next sequential id after the highest existing `D-<n>`.
    pub fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|item| item.id.strip_prefix("D-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("D-{}", max + 1)
    }

    pub fn get(&self, id: &str) -> Option<&DecisionItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DecisionItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Items owned by `stage`, in table order.
    pub fn items_for_stage(&self, stage: StageName) -> Vec<&DecisionItem> {
        self.items
            .iter()
            .filter(|item| item.stage == Some(stage))
            .collect()
    }

    pub fn add(&mut self, input: NewDecisionItem, now: DateTime<Utc>) -> &DecisionItem {
        let item = DecisionItem {
            id: self.next_id(),
            stage: input.stage,
            status: DecisionStatus::Open,
            question: input.question,
            resolution: String::new(),
            priority: input.priority,
            affected_sections: input.affected_sections,
            created_at: now,
            updated_at: now,
        };
        self.items.push(item);
        self.updated_at = Some(now);
        self.items.last().expect("just pushed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_across_gaps() {
        let now = Utc::now();
        let mut table = DecisionTable::default();
        table.add(
            NewDecisionItem {
                question: "first".to_string(),
                ..Default::default()
            },
            now,
        );
        table.add(
            NewDecisionItem {
                question: "second".to_string(),
                ..Default::default()
            },
            now,
        );
        assert_eq!(table.items[0].id, "D-1");
        assert_eq!(table.items[1].id, "D-2");

        // Confirmed items are never deleted, but a hand-edited table with a
        // gap must still produce a fresh id.
        table.items.remove(0);
        assert_eq!(table.next_id(), "D-3");
    }
}
