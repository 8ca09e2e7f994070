//! Per-node decision and execution step.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::memory::{TOOL_CALL_ERROR_KEY, TOOL_CALL_KEY};
use crate::core::types::{ConquerEdge, Decision, NodeBrief};
use crate::io::reasoner::{DecideRequest, Reasoner};
use crate::io::run_state::RunState;
use crate::io::tool::{ToolExecutor, ToolOutcome};
use crate::tree::{NodeId, NodeStatus};

/// Runs one decision for the cursor node and applies its bookkeeping.
#[derive(Debug, Clone)]
pub struct Conqueror {
    tool_catalog: String,
}

impl Conqueror {
    pub fn new(tool_catalog: impl Into<String>) -> Self {
        Self {
            tool_catalog: tool_catalog.into(),
        }
    }

    /// Mark the cursor node running, ask the reasoner for a decision, and
    /// dispatch it.
    ///
    /// A malformed decision propagates as an error before the node's attempt
    /// counter moves, so the driver's bounded retry re-runs this cleanly.
    pub fn run<R: Reasoner, T: ToolExecutor>(
        &self,
        state: &mut RunState,
        reasoner: &R,
        tools: &T,
    ) -> Result<ConquerEdge> {
        let id = state.cursor_id;
        state.tree.get_mut(id)?.status = NodeStatus::Running;

        let decision = {
            let node = state.tree.get(id)?;
            let sibling_tasks = self.sibling_briefs(state, id)?;
            let parent_task = state.tree.parent(id)?.map(NodeBrief::from_node);
            let request = DecideRequest {
                task: &node.task,
                tools: &self.tool_catalog,
                sibling_tasks,
                parent_task,
                prior_results: state.working_memory.snapshot(),
                extra: None,
            };
            reasoner.decide(&request)?.normalize()?
        };

        state.tree.get_mut(id)?.attempts += 1;

        match decision {
            Decision::Answer(content) => {
                debug!(node = id, "direct answer");
                record_success(state, id, content)?;
                Ok(ConquerEdge::Success)
            }
            Decision::Invoke(call) => {
                debug!(node = id, tool = %call.name, "tool call");
                let outcome = tools
                    .execute(&call.name, &call.arguments, state.working_memory.snapshot())
                    .unwrap_or_else(|err| ToolOutcome::Failed(err.to_string()));
                match outcome {
                    ToolOutcome::Success(content) => {
                        record_success(state, id, content)?;
                        Ok(ConquerEdge::Success)
                    }
                    ToolOutcome::Failed(diagnostic) => {
                        warn!(node = id, tool = %call.name, "tool call failed");
                        state.tree.get_mut(id)?.status = NodeStatus::Failed;
                        let call_json =
                            serde_json::to_string(&call).context("serialize recorded tool call")?;
                        state.working_memory.insert(TOOL_CALL_KEY, call_json);
                        state
                            .working_memory
                            .insert(TOOL_CALL_ERROR_KEY, diagnostic);
                        Ok(ConquerEdge::Failed)
                    }
                }
            }
            Decision::Divide(reason) => {
                debug!(node = id, "routed to divide");
                // Status stays running; the divider reads the reason from
                // `result`.
                state.tree.get_mut(id)?.result = Some(reason);
                Ok(ConquerEdge::Complex)
            }
        }
    }

    /// Task metadata of the other members of the sibling group, in id order.
    fn sibling_briefs(&self, state: &RunState, id: NodeId) -> Result<Vec<NodeBrief>> {
        let mut briefs = Vec::new();
        for sid in state.tree.siblings(id)? {
            if sid == id {
                continue;
            }
            briefs.push(NodeBrief::from_node(state.tree.get(sid)?));
        }
        Ok(briefs)
    }
}

fn record_success(state: &mut RunState, id: NodeId, content: String) -> Result<()> {
    state.working_memory.record_result(&state.tree, id, &content)?;
    let node = state.tree.get_mut(id)?;
    node.result = Some(content);
    node.status = NodeStatus::Success;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MalformedDecision, RawDecision, ToolCall};
    use crate::test_support::{ScriptedReasoner, ScriptedTools, answer, divided_state, tool_call};
    use serde_json::json;

    #[test]
    fn agent_answer_marks_success_and_records_memory() {
        let mut state = divided_state(&["t1", "t2"]);
        state.cursor_id = 1;
        let reasoner = ScriptedReasoner::new().with_decision(answer("answer one"));
        let tools = ScriptedTools::new();

        let conqueror = Conqueror::new("no tools");
        let edge = conqueror
            .run(&mut state, &reasoner, &tools)
            .expect("conquer");

        assert_eq!(edge, ConquerEdge::Success);
        let node = state.tree.get(1).expect("node");
        assert_eq!(node.status, NodeStatus::Success);
        assert_eq!(node.result.as_deref(), Some("answer one"));
        assert_eq!(node.attempts, 1);
        assert_eq!(state.working_memory.get("t1"), Some("answer one"));
    }

    #[test]
    fn sibling_context_excludes_self_and_results() {
        let mut state = divided_state(&["t1", "t2"]);
        state.cursor_id = 2;
        let reasoner = ScriptedReasoner::new().with_decision(answer("x"));
        let tools = ScriptedTools::new();

        Conqueror::new("no tools")
            .run(&mut state, &reasoner, &tools)
            .expect("conquer");

        let requests = reasoner.decide_requests();
        assert_eq!(requests.len(), 1);
        let (task, siblings, parent) = &requests[0];
        assert_eq!(task, "t2");
        assert_eq!(siblings, &vec!["t1".to_string()]);
        assert_eq!(parent.as_deref(), Some("root"));
    }

    #[test]
    fn successful_tool_call_books_like_an_answer() {
        let mut state = divided_state(&["t1"]);
        state.cursor_id = 1;
        let reasoner =
            ScriptedReasoner::new().with_decision(tool_call("search", json!({"q": "x"})));
        let tools = ScriptedTools::new().with_outcome(ToolOutcome::Success("found".to_string()));

        let edge = Conqueror::new("search")
            .run(&mut state, &reasoner, &tools)
            .expect("conquer");

        assert_eq!(edge, ConquerEdge::Success);
        assert_eq!(state.tree.get(1).expect("node").result.as_deref(), Some("found"));
        assert_eq!(state.working_memory.get("t1"), Some("found"));
        assert!(state.working_memory.get(TOOL_CALL_KEY).is_none());
    }

    #[test]
    fn failed_tool_call_records_call_and_error() {
        let mut state = divided_state(&["t1"]);
        state.cursor_id = 1;
        let reasoner =
            ScriptedReasoner::new().with_decision(tool_call("search", json!({"q": "x"})));
        let tools = ScriptedTools::new().with_outcome(ToolOutcome::Failed("boom".to_string()));

        let edge = Conqueror::new("search")
            .run(&mut state, &reasoner, &tools)
            .expect("conquer");

        assert_eq!(edge, ConquerEdge::Failed);
        assert_eq!(state.tree.get(1).expect("node").status, NodeStatus::Failed);
        let recorded: ToolCall =
            serde_json::from_str(state.working_memory.get(TOOL_CALL_KEY).expect("call"))
                .expect("parse");
        assert_eq!(recorded.name, "search");
        assert_eq!(state.working_memory.get(TOOL_CALL_ERROR_KEY), Some("boom"));
    }

    #[test]
    fn divide_decision_keeps_node_running_with_reason() {
        let mut state = divided_state(&["t1"]);
        state.cursor_id = 1;
        let reasoner = ScriptedReasoner::new().with_decision(RawDecision {
            divide: Some("needs smaller steps".to_string()),
            ..RawDecision::default()
        });
        let tools = ScriptedTools::new();

        let edge = Conqueror::new("no tools")
            .run(&mut state, &reasoner, &tools)
            .expect("conquer");

        assert_eq!(edge, ConquerEdge::Complex);
        let node = state.tree.get(1).expect("node");
        assert_eq!(node.status, NodeStatus::Running);
        assert_eq!(node.result.as_deref(), Some("needs smaller steps"));
    }

    #[test]
    fn empty_decision_propagates_without_counting_an_attempt() {
        let mut state = divided_state(&["t1"]);
        state.cursor_id = 1;
        let reasoner = ScriptedReasoner::new().with_decision(RawDecision::default());
        let tools = ScriptedTools::new();

        let err = Conqueror::new("no tools")
            .run(&mut state, &reasoner, &tools)
            .expect_err("malformed");

        assert!(err.downcast_ref::<MalformedDecision>().is_some());
        assert_eq!(state.tree.get(1).expect("node").attempts, 0);
        assert_eq!(state.tree.get(1).expect("node").status, NodeStatus::Running);
    }
}
