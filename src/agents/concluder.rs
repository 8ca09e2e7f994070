//! Final-answer synthesis once traversal terminates.

use anyhow::Result;
use tracing::debug;

use crate::io::reasoner::Reasoner;
use crate::io::run_state::RunState;

/// Synthesizes the run's output from the root task and the last result.
///
/// Runs exactly once per run, including runs that ended on an unrecovered
/// failure: whatever result text exists becomes the basis of a best-effort
/// explanation instead of a raw internal error.
#[derive(Debug, Clone, Default)]
pub struct Concluder;

impl Concluder {
    pub fn new() -> Self {
        Self
    }

    pub fn run<R: Reasoner>(&self, state: &mut RunState, reasoner: &R) -> Result<String> {
        let root_task = state.tree.root().task.clone();
        let last_result = state.last_result_text();
        debug!(cursor = state.cursor_id, "concluding run");
        let answer = reasoner.conclude(&root_task, &last_result)?;
        state.working_memory.clear();
        Ok(answer)
    }
}
