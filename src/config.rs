//! Engine configuration, loaded from an optional `weft.toml` at the engine
//! root. Everything has a default; an absent file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "weft.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lock: LockConfig,
    /// Directory under each workspace holding the stage documents.
    pub docs_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            docs_dir: "docs".to_string(),
        }
    }
}

/// Writer-lock tuning for a requirement workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long acquisition may block before failing with WorkspaceBusy.
    pub timeout_secs: f64,
    /// Poll interval while waiting for the lock.
    pub poll_ms: u64,
    /// A lock older than this whose owner is gone is treated as abandoned.
    pub stale_secs: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8.0,
            poll_ms: 50,
            stale_secs: 120.0,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn stale(&self) -> Duration {
        Duration::from_secs_f64(self.stale_secs.max(0.0))
    }
}

impl EngineConfig {
    /// Load `weft.toml` from the engine root, falling back to defaults when
    /// the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(temp.path()).unwrap();
        assert_eq!(config.lock.timeout_secs, 8.0);
        assert_eq!(config.docs_dir, "docs");
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "[lock]\ntimeout_secs = 0.5\n",
        )
        .unwrap();
        let config = EngineConfig::load(temp.path()).unwrap();
        assert_eq!(config.lock.timeout_secs, 0.5);
        assert_eq!(config.lock.poll_ms, 50);
        assert_eq!(config.docs_dir, "docs");
    }
}
