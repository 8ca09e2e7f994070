//! Flat-arena task tree.
//!
//! The tree owns every node in a single `Vec` indexed by id; `parent_id` and
//! `children` are ids, not references. Ids are assigned in creation order, so
//! they are unique but not necessarily in tree-position order. This keeps the
//! structure free of ownership cycles and lets it serialize directly as the
//! node array inside a run state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Node id. Index into the tree's node array.
pub type NodeId = u64;

/// Execution status of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Waiting,
    Running,
    Success,
    Failed,
}

/// One unit of work in the hierarchical plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: NodeId,
    /// Directive text for this node.
    pub task: String,
    /// Self-critique attached at creation time.
    pub criticism: String,
    /// Ordered milestone texts.
    pub milestones: Vec<String>,
    pub status: NodeStatus,
    /// Set only on a terminal outcome of this node's own work (or the divide
    /// reason while the node stays running).
    pub result: Option<String>,
    /// Absent for the root. An id, never a reference.
    pub parent_id: Option<NodeId>,
    /// Child ids in creation order. Set exactly once by a successful divide.
    pub children: Vec<NodeId>,
    /// Dispatched decision attempts for this node. Bounds rescue loops.
    pub attempts: u32,
}

/// Specification for one subtask handed to [`TaskTree::add_subtasks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub task: String,
    #[serde(default)]
    pub criticism: Option<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
}

/// Tree-consistency errors. These indicate a bug in the caller, not a
/// recoverable business outcome, and should abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// No node with the given id exists.
    NodeNotFound(NodeId),
    /// The node's children were already set by an earlier divide.
    AlreadyDivided(NodeId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NodeNotFound(id) => write!(f, "node {id} not found"),
            TreeError::AlreadyDivided(id) => write!(f, "node {id} already divided"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Owner of all task nodes. Serializes transparently as the node array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
}

impl TaskTree {
    /// Create a tree holding only the root node (id 0, waiting).
    pub fn new(root_task: impl Into<String>) -> Self {
        Self {
            nodes: vec![TaskNode {
                id: 0,
                task: root_task.into(),
                criticism: "None".to_string(),
                milestones: Vec::new(),
                status: NodeStatus::Waiting,
                result: None,
                parent_id: None,
                children: Vec::new(),
                attempts: 0,
            }],
        }
    }

    /// Rebuild from a previously serialized node array.
    pub fn from_nodes(nodes: Vec<TaskNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &TaskNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Result<&TaskNode, TreeError> {
        self.nodes
            .get(id as usize)
            .ok_or(TreeError::NodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut TaskNode, TreeError> {
        self.nodes
            .get_mut(id as usize)
            .ok_or(TreeError::NodeNotFound(id))
    }

    /// Parent node, or `None` for the root.
    pub fn parent(&self, id: NodeId) -> Result<Option<&TaskNode>, TreeError> {
        match self.get(id)?.parent_id {
            Some(pid) => Ok(Some(self.get(pid)?)),
            None => Ok(None),
        }
    }

    /// Child ids of `id`, in creation (= ascending id) order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        Ok(&self.get(id)?.children)
    }

    /// All children of `id`'s parent, including `id` itself, ordered by id.
    /// The root has no parent, so its sibling group is just itself.
    pub fn siblings(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        match self.get(id)?.parent_id {
            Some(pid) => {
                let mut ids = self.get(pid)?.children.clone();
                ids.sort_unstable();
                Ok(ids)
            }
            None => Ok(vec![id]),
        }
    }

    /// The sibling with the smallest id greater than `id`, if any.
    pub fn next_sibling(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        let siblings = self.siblings(id)?;
        Ok(siblings.into_iter().find(|&sid| sid > id))
    }

    /// Depth of `id`; the root is at depth 1.
    pub fn depth(&self, id: NodeId) -> Result<u32, TreeError> {
        let mut depth = 1;
        let mut walker = self.get(id)?;
        while let Some(pid) = walker.parent_id {
            walker = self.get(pid)?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Grow the tree under `parent_id`. Assigns the next unused ids in list
    /// order and appends them to the parent's children, atomically.
    ///
    /// Fails with [`TreeError::AlreadyDivided`] if the parent already has
    /// children; the existing children are left unchanged.
    pub fn add_subtasks(
        &mut self,
        parent_id: NodeId,
        specs: Vec<SubtaskSpec>,
    ) -> Result<Vec<NodeId>, TreeError> {
        if !self.get(parent_id)?.children.is_empty() {
            return Err(TreeError::AlreadyDivided(parent_id));
        }

        let first_id = self.nodes.len() as NodeId;
        let mut ids = Vec::with_capacity(specs.len());
        for (offset, spec) in specs.into_iter().enumerate() {
            let id = first_id + offset as NodeId;
            self.nodes.push(TaskNode {
                id,
                task: spec.task,
                criticism: spec.criticism.unwrap_or_else(|| "None".to_string()),
                milestones: spec.milestones,
                status: NodeStatus::Waiting,
                result: None,
                parent_id: Some(parent_id),
                children: Vec::new(),
                attempts: 0,
            });
            ids.push(id);
        }

        // get_mut cannot fail here: parent_id was validated above.
        if let Ok(parent) = self.get_mut(parent_id) {
            parent.children = ids.clone();
        }
        Ok(ids)
    }
}
