//! Engine configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum tree depth the divider will grow to (root is depth 1).
    pub max_task_depth: u32,

    /// Per-node decision attempts before the driver gives up on the node.
    pub max_node_attempts: u32,

    /// Retries for a malformed reasoner decision within one step.
    pub decision_attempts: u32,

    /// Total per-step wall-clock budget in seconds.
    pub step_timeout_secs: u64,

    /// Hard bound on steps per `Driver::run` invocation.
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_task_depth: 5,
            max_node_attempts: 3,
            decision_attempts: 3,
            step_timeout_secs: 10 * 60,
            max_steps: 200,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_task_depth == 0 {
            return Err(anyhow!("max_task_depth must be > 0"));
        }
        if self.max_node_attempts == 0 {
            return Err(anyhow!("max_node_attempts must be > 0"));
        }
        if self.decision_attempts == 0 {
            return Err(anyhow!("decision_attempts must be > 0"));
        }
        if self.step_timeout_secs == 0 {
            return Err(anyhow!("step_timeout_secs must be > 0"));
        }
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}
