//! Content fingerprints and the embedded dependency-signature block.
//!
//! A document written against upstream inputs carries a signature block
//! recording the fingerprint of each upstream document at authoring time:
//!
//! ```text
//! <!-- DEPENDENCY-SIGNATURE:START -->
//! - analysis: 9f86d081884c7d65...
//! - prd: 60303ae22b998861...
//! <!-- DEPENDENCY-SIGNATURE:END -->
//! ```
//!
//! The markers are unambiguous and non-overlapping so the block can be
//! located and replaced without disturbing surrounding prose.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::models::stage::StageName;

pub const SIGNATURE_START: &str = "<!-- DEPENDENCY-SIGNATURE:START -->";
pub const SIGNATURE_END: &str = "<!-- DEPENDENCY-SIGNATURE:END -->";

/// Deterministic fingerprint of document content: SHA-256 over the raw
/// bytes, hex-encoded. Any byte change changes the fingerprint.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn malformed(reason: impl Into<String>) -> EngineError {
    EngineError::MalformedSignature {
        reason: reason.into(),
    }
}

/// Locate the single well-formed marker pair, if any.
///
/// Returns the byte span from the start marker through the end marker.
/// Duplicated, unterminated, or reversed markers are `MalformedSignature`.
fn block_span(content: &str) -> Result<Option<(usize, usize)>> {
    let starts: Vec<usize> = content.match_indices(SIGNATURE_START).map(|(i, _)| i).collect();
    let ends: Vec<usize> = content.match_indices(SIGNATURE_END).map(|(i, _)| i).collect();

    match (starts.len(), ends.len()) {
        (0, 0) => Ok(None),
        (1, 1) => {
            let start = starts[0];
            let end = ends[0];
            if end < start {
                return Err(malformed("end marker precedes start marker"));
            }
            Ok(Some((start, end + SIGNATURE_END.len())))
        }
        (1, 0) => Err(malformed("unterminated signature block")),
        (0, 1) => Err(malformed("end marker without start marker")),
        _ => Err(malformed("duplicated signature markers")),
    }
}

/// Extract the dependency-signature mapping from a document.
///
/// `Ok(None)` when no block is present. A block that exists but cannot be
/// parsed is a recoverable `MalformedSignature`: the authoring agent must
/// regenerate the block, nothing in the engine is broken.
pub fn extract_signature(content: &str) -> Result<Option<BTreeMap<StageName, String>>> {
    let Some((start, end)) = block_span(content)? else {
        return Ok(None);
    };
    let inner = &content[start + SIGNATURE_START.len()..end - SIGNATURE_END.len()];

    let entry = Regex::new(r"^-\s*([a-z_]+)\s*:\s*(\S+)\s*$").expect("Invalid regex pattern");
    let mut mapping = BTreeMap::new();
    for raw in inner.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let captures = entry
            .captures(line)
            .ok_or_else(|| malformed(format!("unparsable entry: {line}")))?;
        let stage = StageName::from_str(&captures[1])
            .map_err(|_| malformed(format!("unknown stage in entry: {}", &captures[1])))?;
        let digest = captures[2].to_string();
        if mapping.insert(stage, digest).is_some() {
            return Err(malformed(format!("duplicate entry for stage: {stage}")));
        }
    }
    Ok(Some(mapping))
}

fn render_block(mapping: &BTreeMap<StageName, String>) -> String {
    let mut block = String::from(SIGNATURE_START);
    block.push('\n');
    for (stage, digest) in mapping {
        block.push_str(&format!("- {stage}: {digest}\n"));
    }
    block.push_str(SIGNATURE_END);
    block
}

/// Replace the existing signature block, or append one, leaving all other
/// content byte-for-byte intact. A malformed existing block is an error;
/// the caller regenerates the document rather than patching around broken
/// markers.
pub fn embed_signature(content: &str, mapping: &BTreeMap<StageName, String>) -> Result<String> {
    let block = render_block(mapping);
    match block_span(content)? {
        Some((start, end)) => {
            let mut out = String::with_capacity(content.len() + block.len());
            out.push_str(&content[..start]);
            out.push_str(&block);
            out.push_str(&content[end..]);
            Ok(out)
        }
        None => {
            if content.is_empty() {
                return Ok(format!("{block}\n"));
            }
            let separator = if content.ends_with('\n') { "\n" } else { "\n\n" };
            Ok(format!("{content}{separator}{block}\n"))
        }
    }
}
