//! Per-node decomposition step.

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::types::{Decomposition, NodeBrief};
use crate::io::reasoner::{DecomposeRequest, Reasoner};
use crate::io::run_state::RunState;
use crate::tree::{NodeId, NodeStatus};

/// Edge returned by a divide attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivideEdge {
    /// The tree grew; the cursor must jump to this lowest-id child.
    Divided { first_child: NodeId },
    /// Decomposition refused (depth limit or reasoner refusal). The node is
    /// failed with the reason as its result.
    Failed,
}

/// Grows the tree under the cursor node.
#[derive(Debug, Clone)]
pub struct Divider {
    max_task_depth: u32,
    tool_catalog: String,
}

impl Divider {
    pub fn new(max_task_depth: u32, tool_catalog: impl Into<String>) -> Self {
        Self {
            max_task_depth,
            tool_catalog: tool_catalog.into(),
        }
    }

    /// Decompose the cursor node into subtasks.
    ///
    /// The depth guard runs before any reasoner call: a node already at the
    /// depth limit fails immediately, avoiding the round-trip cost.
    pub fn run<R: Reasoner>(&self, state: &mut RunState, reasoner: &R) -> Result<DivideEdge> {
        let id = state.cursor_id;
        let depth = state.tree.depth(id)?;
        if depth >= self.max_task_depth {
            warn!(node = id, depth, limit = self.max_task_depth, "divide refused");
            return self.fail(state, id, "max depth reached".to_string());
        }

        let raw = {
            let node = state.tree.get(id)?;
            let uplevel_context = state.tree.parent(id)?.map(NodeBrief::from_node);
            let request = DecomposeRequest {
                parent_task: &node.task,
                uplevel_context,
                former_result: node.result.as_deref(),
                tools: &self.tool_catalog,
            };
            reasoner.decompose(&request)?
        };

        match raw.normalize() {
            Decomposition::Tasks(specs) => {
                let ids = state.tree.add_subtasks(id, specs)?;
                debug!(node = id, children = ids.len(), "divided");
                Ok(DivideEdge::Divided {
                    first_child: ids[0],
                })
            }
            Decomposition::Failed(reason) => self.fail(state, id, reason),
        }
    }

    fn fail(&self, state: &mut RunState, id: NodeId, reason: String) -> Result<DivideEdge> {
        let node = state.tree.get_mut(id)?;
        node.status = NodeStatus::Failed;
        node.result = Some(reason);
        Ok(DivideEdge::Failed)
    }
}
