//! One-shot recovery after a failed tool call.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::memory::{
    FAILED_DETAIL_KEY, RESCUE_DETAIL_KEY, TOOL_CALL_ERROR_KEY, TOOL_CALL_KEY,
};
use crate::core::types::ToolCall;
use crate::io::reasoner::Reasoner;
use crate::io::run_state::RunState;
use crate::io::tool::{ToolExecutor, ToolOutcome};
use crate::tree::NodeStatus;

/// Edge returned by a rescue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueEdge {
    /// The retried call succeeded; traversal resumes as if the conqueror had
    /// succeeded on this node.
    Success,
    /// Recovery failed; the node goes back to running for a fresh conquer
    /// attempt.
    Failure,
}

/// Retries the recorded failed tool call once, with a fresh diagnostic.
#[derive(Debug, Clone, Default)]
pub struct Rescue;

impl Rescue {
    pub fn new() -> Self {
        Self
    }

    pub fn run<R: Reasoner, T: ToolExecutor>(
        &self,
        state: &mut RunState,
        reasoner: &R,
        tools: &T,
    ) -> Result<RescueEdge> {
        let id = state.cursor_id;

        let recorded = state
            .working_memory
            .get(TOOL_CALL_KEY)
            .map(str::to_string)
            .zip(
                state
                    .working_memory
                    .get(TOOL_CALL_ERROR_KEY)
                    .map(str::to_string),
            );
        let Some((call_json, error_text)) = recorded else {
            // Nothing recorded to retry; hand the node back to the conqueror.
            warn!(node = id, "rescue invoked without a recorded tool call");
            state.tree.get_mut(id)?.status = NodeStatus::Running;
            return Ok(RescueEdge::Failure);
        };

        let call: ToolCall =
            serde_json::from_str(&call_json).context("parse recorded tool call")?;
        let task = state.tree.get(id)?.task.clone();
        let diagnostic = reasoner.diagnose(&task, &error_text)?;
        state.working_memory.insert(FAILED_DETAIL_KEY, diagnostic);

        let outcome = tools
            .execute(&call.name, &call.arguments, state.working_memory.snapshot())
            .unwrap_or_else(|err| ToolOutcome::Failed(err.to_string()));

        match outcome {
            ToolOutcome::Success(content) => {
                debug!(node = id, tool = %call.name, "rescue succeeded");
                state.working_memory.remove(TOOL_CALL_KEY);
                state.working_memory.remove(TOOL_CALL_ERROR_KEY);
                state.working_memory.remove(FAILED_DETAIL_KEY);
                state.working_memory.insert(RESCUE_DETAIL_KEY, content.clone());
                let node = state.tree.get_mut(id)?;
                node.result = Some(content);
                node.status = NodeStatus::Success;
                Ok(RescueEdge::Success)
            }
            ToolOutcome::Failed(_) => {
                // Not left failed: the conqueror gets a fresh attempt, with
                // the recorded call still in place for a later rescue.
                warn!(node = id, tool = %call.name, "rescue failed");
                state.tree.get_mut(id)?.status = NodeStatus::Running;
                Ok(RescueEdge::Failure)
            }
        }
    }
}
