//! Content store: the current byte content of each stage document.
//!
//! Documents are only ever overwritten, never deleted; fingerprints are
//! computed over exactly what is on disk.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use super::workspace::WorkspaceDir;
use super::write_atomic;
use crate::models::stage::StageName;
use crate::signature::fingerprint;

pub fn read_document(workspace: &WorkspaceDir, stage: StageName) -> Result<Option<String>> {
    let Some(path) = workspace.doc_path(stage) else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(&path)
        .map(Some)
        .with_context(|| format!("Failed to read document: {}", path.display()))
}

pub fn write_document(
    workspace: &WorkspaceDir,
    stage: StageName,
    content: &str,
) -> Result<PathBuf> {
    let path = workspace
        .doc_path(stage)
        .with_context(|| format!("stage {stage} has no document"))?;
    write_atomic(&path, content)?;
    Ok(path)
}

/// Current fingerprint of every stage document that exists on disk.
pub fn live_fingerprints(workspace: &WorkspaceDir) -> Result<BTreeMap<StageName, String>> {
    let mut fingerprints = BTreeMap::new();
    for stage in StageName::DOC_STAGES {
        if let Some(content) = read_document(workspace, stage)? {
            fingerprints.insert(stage, fingerprint(&content));
        }
    }
    Ok(fingerprints)
}

/// Current fingerprints of the documents `stage` depends on, restricted to
/// those that exist.
pub fn upstream_fingerprints(
    workspace: &WorkspaceDir,
    stage: StageName,
) -> Result<BTreeMap<StageName, String>> {
    let live = live_fingerprints(workspace)?;
    Ok(stage
        .upstream()
        .iter()
        .filter_map(|dep| live.get(dep).map(|digest| (*dep, digest.clone())))
        .collect())
}
