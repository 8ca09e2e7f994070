//! Test-only scripted collaborators and state builders.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::types::{RawDecision, RawDecomposition, ToolCall};
use crate::io::reasoner::{DecideRequest, DecomposeRequest, Reasoner};
use crate::io::run_state::RunState;
use crate::io::tool::{ToolExecutor, ToolOutcome};
use crate::tree::{NodeStatus, SubtaskSpec};

/// Raw decision carrying a direct answer.
pub fn answer(text: &str) -> RawDecision {
    RawDecision {
        agent_answer: Some(text.to_string()),
        ..RawDecision::default()
    }
}

/// Raw decision routing the node to decomposition.
pub fn divide(reason: &str) -> RawDecision {
    RawDecision {
        divide: Some(reason.to_string()),
        ..RawDecision::default()
    }
}

/// Raw decision carrying a tool call.
pub fn tool_call(name: &str, arguments: Value) -> RawDecision {
    RawDecision {
        tool_call: Some(ToolCall {
            name: name.to_string(),
            arguments,
        }),
        ..RawDecision::default()
    }
}

/// Raw decomposition producing the given subtasks.
pub fn subtasks(tasks: &[&str]) -> RawDecomposition {
    RawDecomposition {
        tasks: Some(
            tasks
                .iter()
                .map(|task| SubtaskSpec {
                    task: (*task).to_string(),
                    criticism: None,
                    milestones: Vec::new(),
                })
                .collect(),
        ),
        failed_reason: None,
    }
}

/// Run state whose root ("root") is already divided into the given tasks.
/// The root is left running with the divide reason in place.
pub fn divided_state(tasks: &[&str]) -> RunState {
    let mut state = RunState::new("root");
    let root = state.tree.get_mut(0).expect("root");
    root.status = NodeStatus::Running;
    root.result = Some("too complex".to_string());
    let specs = tasks
        .iter()
        .map(|task| SubtaskSpec {
            task: (*task).to_string(),
            criticism: None,
            milestones: Vec::new(),
        })
        .collect();
    state.tree.add_subtasks(0, specs).expect("divide root");
    state
}

/// Reasoner that replays queued shapes and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    decisions: RefCell<VecDeque<RawDecision>>,
    decompositions: RefCell<VecDeque<RawDecomposition>>,
    diagnosis: RefCell<Option<String>>,
    conclusion: RefCell<Option<String>>,
    decide_count: Cell<u32>,
    diagnose_count: Cell<u32>,
    decide_log: RefCell<Vec<(String, Vec<String>, Option<String>)>>,
    decompose_log: RefCell<Vec<(String, Option<String>)>>,
    conclude_log: RefCell<Vec<(String, String)>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decision(self, decision: RawDecision) -> Self {
        self.decisions.borrow_mut().push_back(decision);
        self
    }

    pub fn with_decomposition(self, decomposition: RawDecomposition) -> Self {
        self.decompositions.borrow_mut().push_back(decomposition);
        self
    }

    pub fn with_diagnosis(self, text: &str) -> Self {
        *self.diagnosis.borrow_mut() = Some(text.to_string());
        self
    }

    pub fn with_conclusion(self, text: &str) -> Self {
        *self.conclusion.borrow_mut() = Some(text.to_string());
        self
    }

    pub fn decide_calls(&self) -> u32 {
        self.decide_count.get()
    }

    pub fn decompose_calls(&self) -> u32 {
        self.decompose_log.borrow().len() as u32
    }

    pub fn diagnose_calls(&self) -> u32 {
        self.diagnose_count.get()
    }

    /// `(task, sibling tasks, parent task)` per decide call.
    pub fn decide_requests(&self) -> Vec<(String, Vec<String>, Option<String>)> {
        self.decide_log.borrow().clone()
    }

    /// `(parent task, former result)` per decompose call.
    pub fn decompose_requests(&self) -> Vec<(String, Option<String>)> {
        self.decompose_log.borrow().clone()
    }

    /// `(root task, last result)` per conclude call.
    pub fn conclude_requests(&self) -> Vec<(String, String)> {
        self.conclude_log.borrow().clone()
    }
}

impl Reasoner for ScriptedReasoner {
    fn decide(&self, request: &DecideRequest<'_>) -> Result<RawDecision> {
        self.decide_count.set(self.decide_count.get() + 1);
        self.decide_log.borrow_mut().push((
            request.task.to_string(),
            request
                .sibling_tasks
                .iter()
                .map(|brief| brief.task.clone())
                .collect(),
            request.parent_task.as_ref().map(|brief| brief.task.clone()),
        ));
        self.decisions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted decision left"))
    }

    fn decompose(&self, request: &DecomposeRequest<'_>) -> Result<RawDecomposition> {
        self.decompose_log.borrow_mut().push((
            request.parent_task.to_string(),
            request.former_result.map(str::to_string),
        ));
        self.decompositions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted decomposition left"))
    }

    fn diagnose(&self, _task: &str, _failed_detail: &str) -> Result<String> {
        self.diagnose_count.set(self.diagnose_count.get() + 1);
        self.diagnosis
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("no scripted diagnosis"))
    }

    fn conclude(&self, root_task: &str, last_result: &str) -> Result<String> {
        self.conclude_log
            .borrow_mut()
            .push((root_task.to_string(), last_result.to_string()));
        self.conclusion
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("no scripted conclusion"))
    }
}

/// Tool executor that replays queued outcomes and records every call.
#[derive(Debug, Default)]
pub struct ScriptedTools {
    outcomes: RefCell<VecDeque<ToolOutcome>>,
    call_log: RefCell<Vec<(String, Value, BTreeMap<String, String>)>>,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, outcome: ToolOutcome) -> Self {
        self.outcomes.borrow_mut().push_back(outcome);
        self
    }

    /// `(name, arguments, context)` per execute call.
    pub fn calls(&self) -> Vec<(String, Value, BTreeMap<String, String>)> {
        self.call_log.borrow().clone()
    }
}

impl ToolExecutor for ScriptedTools {
    fn execute(
        &self,
        name: &str,
        arguments: &Value,
        context: &BTreeMap<String, String>,
    ) -> Result<ToolOutcome> {
        self.call_log
            .borrow_mut()
            .push((name.to_string(), arguments.clone(), context.clone()));
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted tool outcome left"))
    }
}
