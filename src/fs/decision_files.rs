//! Decision-item table I/O.
//!
//! An absent table is an empty table; items are only ever appended or
//! status-flipped, never deleted.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;

use super::workspace::WorkspaceDir;
use super::write_atomic;
use crate::models::decision::DecisionTable;

pub fn load_decisions(workspace: &WorkspaceDir) -> Result<DecisionTable> {
    let path = workspace.decisions_path();
    if !path.exists() {
        return Ok(DecisionTable::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read decision table: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse decision table: {}", path.display()))
}

pub fn save_decisions(workspace: &WorkspaceDir, table: &mut DecisionTable) -> Result<()> {
    table.updated_at = Some(Utc::now());
    let yaml =
        serde_yaml::to_string(table).context("Failed to serialize decision table to YAML")?;
    write_atomic(&workspace.decisions_path(), &yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::decision::NewDecisionItem;
    use crate::models::stage::StageName;

    #[test]
    fn absent_table_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let ws = WorkspaceDir::resolve(temp.path(), "ws", "docs").unwrap();
        let table = load_decisions(&ws).unwrap();
        assert!(table.items.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let ws = WorkspaceDir::resolve(temp.path(), "ws", "docs").unwrap();
        ws.ensure_layout().unwrap();

        let mut table = DecisionTable::default();
        table.add(
            NewDecisionItem {
                stage: Some(StageName::Prd),
                question: "retention period?".to_string(),
                ..Default::default()
            },
            Utc::now(),
        );
        save_decisions(&ws, &mut table).unwrap();

        let loaded = load_decisions(&ws).unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].id, "D-1");
        assert_eq!(loaded.items[0].stage, Some(StageName::Prd));
    }
}
