//! Deterministic phase classification.
//!
//! The external scheduler persists nothing but the run state, so the phase to
//! execute next is derived purely from tree status, cursor, and working
//! memory. Re-running the classifier after a restart yields the same phase,
//! which makes every step an idempotent replay.

use crate::core::memory::{TOOL_CALL_KEY, WorkingMemory};
use crate::core::selector::{Step, next_cursor};
use crate::tree::{NodeId, NodeStatus, TaskTree, TreeError};

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Decide and execute the cursor node.
    Conquer,
    /// Decompose the cursor node into subtasks.
    Divide,
    /// Attempt the one-shot recovery of a failed tool call.
    Rescue,
    /// Move the cursor to this node.
    Advance(NodeId),
    /// Traversal is over; synthesize the final answer.
    Conclude,
}

/// Classify the next phase from persisted state alone.
pub fn classify(
    tree: &TaskTree,
    cursor_id: NodeId,
    memory: &WorkingMemory,
) -> Result<Phase, TreeError> {
    let node = tree.get(cursor_id)?;
    match node.status {
        NodeStatus::Waiting => Ok(Phase::Conquer),
        NodeStatus::Running => {
            if let Some(&first) = node.children.iter().min() {
                // A divide already grew the tree; replay the first-child jump.
                Ok(Phase::Advance(first))
            } else if node.result.is_some() {
                // Conqueror routed `complex`; the reason sits in `result`.
                Ok(Phase::Divide)
            } else {
                // Fresh attempt after a rescue failure.
                Ok(Phase::Conquer)
            }
        }
        NodeStatus::Success => match next_cursor(tree, cursor_id)? {
            Step::Continue(id) => Ok(Phase::Advance(id)),
            Step::Terminate => Ok(Phase::Conclude),
        },
        NodeStatus::Failed => {
            if memory.get(TOOL_CALL_KEY).is_some() {
                Ok(Phase::Rescue)
            } else {
                Ok(Phase::Conclude)
            }
        }
    }
}
