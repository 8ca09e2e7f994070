//! Step orchestration for a run.
//!
//! The driver owns explicitly constructed components plus the two
//! collaborators; nothing is resolved from global state. [`Driver::step`]
//! executes exactly one phase derived from the run state, so an external
//! scheduler can persist the state between steps and resume anywhere.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::concluder::Concluder;
use crate::agents::conqueror::Conqueror;
use crate::agents::divider::{DivideEdge, Divider};
use crate::agents::rescue::Rescue;
use crate::core::budget::remaining_budget;
use crate::core::classifier::{Phase, classify};
use crate::core::memory::TOOL_CALL_KEY;
use crate::core::types::MalformedDecision;
use crate::io::config::EngineConfig;
use crate::io::reasoner::Reasoner;
use crate::io::run_state::RunState;
use crate::io::tool::ToolExecutor;
use crate::tree::{NodeId, NodeStatus};

/// Result of a single driver step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The run continues; the cursor now sits on `cursor`.
    Continue { phase: Phase, cursor: NodeId },
    /// Traversal terminated and the concluder produced the final answer.
    Finished { answer: String },
}

/// `Driver::run` exceeded the configured step bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxStepsExceededError {
    pub steps: u32,
    pub max_steps: u32,
}

impl fmt::Display for MaxStepsExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run exceeded {} steps (executed {})",
            self.max_steps, self.steps
        )
    }
}

impl std::error::Error for MaxStepsExceededError {}

/// External loop driving one run to completion.
pub struct Driver<R: Reasoner, T: ToolExecutor> {
    reasoner: R,
    tools: T,
    config: EngineConfig,
    conqueror: Conqueror,
    divider: Divider,
    rescue: Rescue,
    concluder: Concluder,
}

impl<R: Reasoner, T: ToolExecutor> Driver<R, T> {
    pub fn new(
        reasoner: R,
        tools: T,
        config: EngineConfig,
        tool_catalog: impl Into<String>,
    ) -> Self {
        let catalog = tool_catalog.into();
        Self {
            reasoner,
            tools,
            conqueror: Conqueror::new(catalog.clone()),
            divider: Divider::new(config.max_task_depth, catalog),
            rescue: Rescue::new(),
            concluder: Concluder::new(),
            config,
        }
    }

    pub fn reasoner(&self) -> &R {
        &self.reasoner
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Execute exactly one phase. At most one collaborator round trip happens
    /// per step (the malformed-decision retry wrapper excepted).
    #[instrument(skip_all, fields(cursor = state.cursor_id))]
    pub fn step(&self, state: &mut RunState) -> Result<StepOutcome> {
        let phase = classify(&state.tree, state.cursor_id, &state.working_memory)?;
        match phase {
            Phase::Conquer => self.conquer_step(state, phase),
            Phase::Divide => {
                let edge = self.divider.run(state, &self.reasoner)?;
                if let DivideEdge::Divided { first_child } = edge {
                    self.move_cursor(state, first_child)?;
                }
                info!(?edge, cursor = state.cursor_id, "divide step");
                Ok(StepOutcome::Continue {
                    phase,
                    cursor: state.cursor_id,
                })
            }
            Phase::Rescue => {
                let edge = self.rescue.run(state, &self.reasoner, &self.tools)?;
                info!(?edge, cursor = state.cursor_id, "rescue step");
                Ok(StepOutcome::Continue {
                    phase,
                    cursor: state.cursor_id,
                })
            }
            Phase::Advance(next) => {
                self.move_cursor(state, next)?;
                Ok(StepOutcome::Continue {
                    phase,
                    cursor: next,
                })
            }
            Phase::Conclude => {
                let answer = self.concluder.run(state, &self.reasoner)?;
                info!("run finished");
                Ok(StepOutcome::Finished { answer })
            }
        }
    }

    /// Run steps until the concluder produces the final answer.
    pub fn run(&self, state: &mut RunState) -> Result<String> {
        self.run_with(state, |_| {})
    }

    /// Like [`Driver::run`], invoking `on_step` after every step.
    pub fn run_with<F: FnMut(&StepOutcome)>(
        &self,
        state: &mut RunState,
        mut on_step: F,
    ) -> Result<String> {
        let mut steps = 0u32;
        loop {
            if steps >= self.config.max_steps {
                return Err(MaxStepsExceededError {
                    steps,
                    max_steps: self.config.max_steps,
                }
                .into());
            }
            let outcome = self.step(state)?;
            steps += 1;
            on_step(&outcome);
            if let StepOutcome::Finished { answer } = outcome {
                return Ok(answer);
            }
        }
    }

    fn conquer_step(&self, state: &mut RunState, phase: Phase) -> Result<StepOutcome> {
        let id = state.cursor_id;
        let attempts = state.tree.get(id)?.attempts;
        if attempts >= self.config.max_node_attempts {
            // Stop the rescue/re-conquer loop: fail the node and drop the
            // recorded call so the next step concludes best-effort.
            warn!(node = id, attempts, "node attempts exhausted");
            state.tree.get_mut(id)?.status = NodeStatus::Failed;
            state.working_memory.remove(TOOL_CALL_KEY);
            return Ok(StepOutcome::Continue { phase, cursor: id });
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.step_timeout_secs);
        let mut attempt = 0u32;
        let edge = loop {
            attempt += 1;
            match self.conqueror.run(state, &self.reasoner, &self.tools) {
                Ok(edge) => break edge,
                Err(err) => {
                    let malformed = err.downcast_ref::<MalformedDecision>().is_some();
                    if malformed
                        && attempt < self.config.decision_attempts
                        && remaining_budget(deadline).is_ok()
                    {
                        warn!(node = id, attempt, "malformed decision; retrying");
                        continue;
                    }
                    return Err(err);
                }
            }
        };
        info!(?edge, node = id, "conquer step");
        Ok(StepOutcome::Continue { phase, cursor: id })
    }

    fn move_cursor(&self, state: &mut RunState, next: NodeId) -> Result<()> {
        state.cursor_id = next;
        state.working_memory.clear_on_group_entry(&state.tree, next)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::TOOL_CALL_ERROR_KEY;
    use crate::core::types::RawDecision;
    use crate::test_support::{ScriptedReasoner, ScriptedTools, answer, divided_state};

    fn driver(reasoner: ScriptedReasoner, config: EngineConfig) -> Driver<ScriptedReasoner, ScriptedTools> {
        Driver::new(reasoner, ScriptedTools::new(), config, "no tools")
    }

    #[test]
    fn malformed_decisions_retry_up_to_the_configured_bound() {
        let mut state = RunState::new("root");
        let reasoner = ScriptedReasoner::new()
            .with_decision(RawDecision::default())
            .with_decision(RawDecision::default())
            .with_decision(answer("fine"));
        let driver = driver(reasoner, EngineConfig::default());

        let outcome = driver.step(&mut state).expect("step");
        assert!(matches!(outcome, StepOutcome::Continue { .. }));
        assert_eq!(driver.reasoner().decide_calls(), 3);
        assert_eq!(
            state.tree.get(0).expect("root").result.as_deref(),
            Some("fine")
        );
    }

    #[test]
    fn malformed_decisions_become_hard_failures_once_exhausted() {
        let mut state = RunState::new("root");
        let reasoner = ScriptedReasoner::new()
            .with_decision(RawDecision::default())
            .with_decision(RawDecision::default())
            .with_decision(RawDecision::default());
        let config = EngineConfig {
            decision_attempts: 3,
            ..EngineConfig::default()
        };
        let driver = driver(reasoner, config);

        let err = driver.step(&mut state).expect_err("exhausted");
        assert!(err.downcast_ref::<MalformedDecision>().is_some());
        assert_eq!(driver.reasoner().decide_calls(), 3);
    }

    #[test]
    fn exhausted_node_attempts_fail_the_node_and_drop_the_recorded_call() {
        let mut state = divided_state(&["t1"]);
        state.cursor_id = 1;
        let node = state.tree.get_mut(1).expect("node");
        node.status = NodeStatus::Running;
        node.attempts = 3;
        state.working_memory.insert(TOOL_CALL_KEY, "{}");
        state.working_memory.insert(TOOL_CALL_ERROR_KEY, "boom");

        let driver = driver(ScriptedReasoner::new(), EngineConfig::default());
        let outcome = driver.step(&mut state).expect("step");

        assert!(matches!(outcome, StepOutcome::Continue { .. }));
        assert_eq!(state.tree.get(1).expect("node").status, NodeStatus::Failed);
        assert!(state.working_memory.get(TOOL_CALL_KEY).is_none());
        // Kept for the concluder's best-effort explanation.
        assert_eq!(state.working_memory.get(TOOL_CALL_ERROR_KEY), Some("boom"));
        assert_eq!(driver.reasoner().decide_calls(), 0);
    }

    #[test]
    fn run_stops_with_max_steps_error_when_the_bound_is_hit() {
        let mut state = RunState::new("root");
        // A decision is always available, but the bound of one step cannot
        // reach the concluder.
        let reasoner = ScriptedReasoner::new().with_decision(answer("fine"));
        let config = EngineConfig {
            max_steps: 1,
            ..EngineConfig::default()
        };
        let driver = driver(reasoner, config);

        let err = driver.run(&mut state).expect_err("bounded");
        let stop = err
            .downcast_ref::<MaxStepsExceededError>()
            .expect("max steps error");
        assert_eq!(stop.max_steps, 1);
    }
}
