//! Input validation for workspace names.
//!
//! Workspace names become directory names, so they are validated before any
//! path construction to rule out traversal and reserved-name surprises.

use anyhow::{bail, Result};

/// Maximum allowed length for workspace names.
pub const MAX_WORKSPACE_NAME_LENGTH: usize = 128;

/// Reserved names that cannot be used as workspace names (case-insensitive).
const RESERVED_NAMES: &[&str] = &[
    ".", "..", "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
    "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Validates that a workspace name is safe for use in file paths.
///
/// A name is valid if it is non-empty, at most `MAX_WORKSPACE_NAME_LENGTH`
/// characters, contains only alphanumeric characters, dashes, and
/// underscores, and does not use a reserved system name.
pub fn validate_workspace_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("workspace name cannot be empty");
    }

    if name.len() > MAX_WORKSPACE_NAME_LENGTH {
        bail!(
            "workspace name too long: {} characters (max {})",
            name.len(),
            MAX_WORKSPACE_NAME_LENGTH
        );
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_chars {
        bail!(
            "workspace name '{name}' contains invalid characters. Use only alphanumeric characters, dashes (-), and underscores (_)"
        );
    }

    let lower = name.to_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) {
        bail!("workspace name '{name}' uses a reserved name");
    }

    Ok(())
}

/// Clap value-parser wrapper for workspace name arguments.
pub fn clap_workspace_validator(value: &str) -> Result<String, String> {
    validate_workspace_name(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_workspace_name("2026-08-07-order-export").is_ok());
        assert!(validate_workspace_name("billing_v2").is_ok());
    }

    #[test]
    fn rejects_traversal_and_separators() {
        assert!(validate_workspace_name("../etc").is_err());
        assert!(validate_workspace_name("a/b").is_err());
        assert!(validate_workspace_name("").is_err());
    }

    #[test]
    fn rejects_reserved_names() {
        assert!(validate_workspace_name("CON").is_err());
    }
}
