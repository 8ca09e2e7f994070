//! Tool execution abstraction.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

/// Business outcome of one tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool ran and produced this result text.
    Success(String),
    /// The tool ran and failed with this diagnostic text.
    Failed(String),
}

/// External collaborator that performs one named side-effecting action.
///
/// `context` is the current working-memory snapshot. A returned `Err` is a
/// transport problem; the conqueror treats it the same as
/// [`ToolOutcome::Failed`].
pub trait ToolExecutor {
    fn execute(
        &self,
        name: &str,
        arguments: &Value,
        context: &BTreeMap<String, String>,
    ) -> Result<ToolOutcome>;
}
