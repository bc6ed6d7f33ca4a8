//! Decision-item CRUD.
//!
//! Items owned by a stage are mirrored into that stage's document, so every
//! mutation here can change the owning document's fingerprint and cascade
//! staleness downstream. The owning stage's own record is kept consistent
//! (its doc fingerprint is refreshed), so the cascade lands strictly below.

use chrono::Utc;

use super::Engine;
use crate::error::{EngineError, Result};
use crate::fs::decision_files::{load_decisions, save_decisions};
use crate::fs::documents::{read_document, write_document};
use crate::fs::state_files::{load_state, save_state};
use crate::fs::WorkspaceDir;
use crate::gate::embed_decisions;
use crate::models::decision::{DecisionItem, DecisionStatus, DecisionTable, NewDecisionItem};
use crate::models::stage::{StageName, StageStatus};

impl Engine {
    /// Open items visible to `scope`: everything owned at or before that
    /// stage plus pipeline-wide items. Without a scope, all open items.
    pub fn list_open_items(
        &self,
        name: &str,
        scope: Option<StageName>,
    ) -> Result<Vec<DecisionItem>> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.read_guard(&workspace)?;
        let table = load_decisions(&workspace)?;
        Ok(table
            .items
            .into_iter()
            .filter(|item| item.status == DecisionStatus::Open)
            .filter(|item| match (scope, item.stage) {
                (Some(scope), Some(owner)) => owner <= scope,
                _ => true,
            })
            .collect())
    }

    /// Record a new open decision item.
    pub fn add_item(&self, name: &str, input: NewDecisionItem) -> Result<DecisionItem> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut table = load_decisions(&workspace)?;
        let item = table.add(input, Utc::now()).clone();
        if let Some(stage) = item.stage {
            self.mirror_into_document(&workspace, &table, stage)?;
        }
        save_decisions(&workspace, &mut table)?;
        tracing::debug!(workspace = name, id = %item.id, "decision item added");
        Ok(item)
    }

    /// Resolve an item. Idempotent: re-resolving overwrites the resolution
    /// text without error. Closure is only ever this explicit status change;
    /// items are never deleted.
    pub fn resolve_item(&self, name: &str, id: &str, resolution: &str) -> Result<DecisionItem> {
        let workspace = self.initialized_workspace(name)?;
        let _guard = self.write_guard(&workspace)?;

        let mut table = load_decisions(&workspace)?;
        let now = Utc::now();
        let item = table
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownItem { id: id.to_string() })?;
        item.status = DecisionStatus::Confirmed;
        item.resolution = resolution.to_string();
        item.updated_at = now;
        let resolved = item.clone();

        if let Some(stage) = resolved.stage {
            self.mirror_into_document(&workspace, &table, stage)?;
        }
        save_decisions(&workspace, &mut table)?;
        tracing::info!(workspace = name, id, "decision item resolved");
        Ok(resolved)
    }

    /// Re-embed the decisions block for `stage` and keep the stage record's
    /// own fingerprint in step with the rewrite. Downstream records still
    /// hold the old fingerprint, which is exactly what makes them stale.
    fn mirror_into_document(
        &self,
        workspace: &WorkspaceDir,
        table: &DecisionTable,
        stage: StageName,
    ) -> Result<()> {
        let Some(content) = read_document(workspace, stage)? else {
            // Stage not authored yet; the block lands when it is.
            return Ok(());
        };
        let items = table.items_for_stage(stage);
        let updated = embed_decisions(&content, &items)?;
        if updated == content {
            return Ok(());
        }
        write_document(workspace, stage, &updated)?;

        let mut state = load_state(workspace)?;
        let record = state.record_mut(stage);
        if record.status == StageStatus::Completed {
            record.doc_fingerprint = crate::signature::fingerprint(&updated);
            record.updated_at = Utc::now();
            save_state(workspace, &mut state)?;
        }
        Ok(())
    }
}
