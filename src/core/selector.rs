//! Deterministic cursor selection over the task tree.

use crate::tree::{NodeId, NodeStatus, TaskTree, TreeError};

/// Next move for the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the cursor to this node.
    Continue(NodeId),
    /// The run is over: a failed node was reached unrecovered, or the
    /// depth-first walk exhausted the tree.
    Terminate,
}

/// Pick the cursor position that follows `cursor_id`.
///
/// Depth-first order: lowest-id child first, then the next sibling, then the
/// nearest ancestor's next sibling. Never mutates the tree.
pub fn next_cursor(tree: &TaskTree, cursor_id: NodeId) -> Result<Step, TreeError> {
    let node = tree.get(cursor_id)?;
    if node.status == NodeStatus::Failed {
        return Ok(Step::Terminate);
    }

    if let Some(&first) = node.children.iter().min() {
        return Ok(Step::Continue(first));
    }

    if let Some(sibling) = tree.next_sibling(cursor_id)? {
        return Ok(Step::Continue(sibling));
    }

    let mut walker = node;
    while let Some(pid) = walker.parent_id {
        if let Some(sibling) = tree.next_sibling(pid)? {
            return Ok(Step::Continue(sibling));
        }
        walker = tree.get(pid)?;
    }

    Ok(Step::Terminate)
}
