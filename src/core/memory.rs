//! Sibling-group-scoped working memory.
//!
//! Results produced by earlier siblings under the current parent are shown to
//! the reasoner as prior context. The map is keyed by the producing node's
//! task text, with a few reserved keys for tool-failure bookkeeping. Lifetime
//! is one sibling group: the map is cleared when the cursor enters a group
//! that has not contributed any entries yet. Both clearing sites evaluate the
//! same predicate over persisted state, so replaying a step never clears
//! twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tree::{NodeId, TaskTree, TreeError};

/// Serialized tool call recorded after an execution failure.
pub const TOOL_CALL_KEY: &str = "tool_call";
/// Diagnostic text recorded after an execution failure.
pub const TOOL_CALL_ERROR_KEY: &str = "tool_call_error";
/// Rescue diagnostic handed to the retried tool execution.
pub const FAILED_DETAIL_KEY: &str = "failed_detail";
/// Result text of a successful rescue.
pub const RESCUE_DETAIL_KEY: &str = "rescue_detail";

/// Map from task text (or a reserved key) to previously produced result text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkingMemory {
    entries: BTreeMap<String, String>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view handed to collaborators as context.
    pub fn snapshot(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// True if any member of `id`'s sibling group has already written its
    /// result into the map.
    pub fn group_has_entries(&self, tree: &TaskTree, id: NodeId) -> Result<bool, TreeError> {
        for sid in tree.siblings(id)? {
            if self.entries.contains_key(&tree.get(sid)?.task) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Clear the map when the cursor enters the lowest-id child of a parent
    /// whose children have not contributed any entries yet. Returns whether a
    /// clear happened.
    pub fn clear_on_group_entry(
        &mut self,
        tree: &TaskTree,
        entering_id: NodeId,
    ) -> Result<bool, TreeError> {
        let Some(pid) = tree.get(entering_id)?.parent_id else {
            return Ok(false);
        };
        let first = tree.children(pid)?.iter().copied().min();
        if first != Some(entering_id) {
            return Ok(false);
        }
        if self.group_has_entries(tree, entering_id)? {
            return Ok(false);
        }
        self.clear();
        Ok(true)
    }

    /// Record a node's produced result under its task text. If this is the
    /// first sibling of its parent to write, inherited entries are cleared
    /// first.
    pub fn record_result(
        &mut self,
        tree: &TaskTree,
        id: NodeId,
        content: &str,
    ) -> Result<(), TreeError> {
        if !self.group_has_entries(tree, id)? {
            self.clear();
        }
        self.insert(tree.get(id)?.task.clone(), content);
        Ok(())
    }
}
