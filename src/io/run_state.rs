//! Run state persistence.
//!
//! [`RunState`] is the entire mutable state of a run: the flat node array,
//! the cursor id, and the working memory. The external scheduler persists it
//! between steps and may resume the run on any worker, so no step may depend
//! on in-memory state that is not captured here.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::invariants::validate_tree;
use crate::core::memory::{TOOL_CALL_ERROR_KEY, WorkingMemory};
use crate::tree::{NodeId, TaskTree};

/// Persisted state of one run (`{tree, cursorId, workingMemory}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub tree: TaskTree,
    pub cursor_id: NodeId,
    pub working_memory: WorkingMemory,
}

impl RunState {
    /// Fresh run: a single waiting root, cursor on it, empty memory.
    pub fn new(root_task: impl Into<String>) -> Self {
        Self {
            tree: TaskTree::new(root_task),
            cursor_id: 0,
            working_memory: WorkingMemory::new(),
        }
    }

    /// Best-effort text of the last-produced result, for the concluder: the
    /// cursor node's result, else the recorded tool error, else empty.
    pub fn last_result_text(&self) -> String {
        if let Ok(node) = self.tree.get(self.cursor_id) {
            if let Some(result) = &node.result {
                return result.clone();
            }
        }
        self.working_memory
            .get(TOOL_CALL_ERROR_KEY)
            .unwrap_or_default()
            .to_string()
    }
}

/// Load and validate run state from disk.
pub fn load_run_state(path: &Path) -> Result<RunState> {
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;

    let errors = validate_tree(&state.tree);
    if !errors.is_empty() {
        return Err(anyhow!(
            "run state {} failed validation: {}",
            path.display(),
            errors.join("; ")
        ));
    }
    state
        .tree
        .get(state.cursor_id)
        .with_context(|| format!("run state {} cursor", path.display()))?;

    debug!(cursor = state.cursor_id, nodes = state.tree.len(), "run state loaded");
    Ok(state)
}

/// Atomically write run state to disk (temp file + rename).
pub fn write_run_state(path: &Path, state: &RunState) -> Result<()> {
    debug!(path = %path.display(), cursor = state.cursor_id, nodes = state.tree.len(), "writing run state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp run state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace run state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::TOOL_CALL_ERROR_KEY;
    use crate::tree::{NodeStatus, SubtaskSpec};

    /// Verifies write → read preserves all fields.
    #[test]
    fn run_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");

        let mut state = RunState::new("plan a trip");
        state
            .tree
            .add_subtasks(
                0,
                vec![SubtaskSpec {
                    task: "book flights".to_string(),
                    criticism: Some("check dates".to_string()),
                    milestones: vec!["pick airline".to_string()],
                }],
            )
            .expect("divide");
        state.cursor_id = 1;
        state.working_memory.insert("book flights", "done");

        write_run_state(&path, &state).expect("write");
        let loaded = load_run_state(&path).expect("load");
        assert_eq!(loaded, state);
    }

    /// Persisted shape is the documented `{tree, cursorId, workingMemory}`.
    #[test]
    fn run_state_serializes_with_documented_keys() {
        let state = RunState::new("root");
        let json = serde_json::to_value(&state).expect("serialize");
        assert!(json.get("tree").expect("tree").is_array());
        assert!(json.get("cursorId").is_some());
        assert!(json.get("workingMemory").is_some());
    }

    #[test]
    fn load_rejects_inconsistent_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");

        let mut state = RunState::new("root");
        state.tree.get_mut(0).expect("root").children.push(5);
        let mut buf = serde_json::to_string_pretty(&state).expect("serialize");
        buf.push('\n');
        fs::write(&path, buf).expect("write");

        let err = load_run_state(&path).expect_err("invalid");
        assert!(err.to_string().contains("failed validation"));
    }

    #[test]
    fn load_rejects_dangling_cursor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");

        let mut state = RunState::new("root");
        state.cursor_id = 3;
        write_run_state(&path, &state).expect("write");

        assert!(load_run_state(&path).is_err());
    }

    #[test]
    fn last_result_text_prefers_cursor_result_then_tool_error() {
        let mut state = RunState::new("root");
        assert_eq!(state.last_result_text(), "");

        state
            .working_memory
            .insert(TOOL_CALL_ERROR_KEY, "tool blew up");
        assert_eq!(state.last_result_text(), "tool blew up");

        let root = state.tree.get_mut(0).expect("root");
        root.status = NodeStatus::Success;
        root.result = Some("the answer".to_string());
        assert_eq!(state.last_result_text(), "the answer");
    }
}
