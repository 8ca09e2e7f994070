//! Reasoner abstraction.
//!
//! The [`Reasoner`] trait decouples the state machine from the decision
//! backend (an LLM round trip in production). Calls are synchronous blocking
//! round trips; the core issues at most one per step. Tests use scripted
//! reasoners that return predetermined shapes.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::core::types::{NodeBrief, RawDecision, RawDecomposition};

/// Context gathered for a per-node decision.
///
/// Sibling entries are the other members of the node's sibling group, exposed
/// as task metadata only; produced results travel through `prior_results`.
#[derive(Debug, Clone)]
pub struct DecideRequest<'a> {
    /// The node's own directive text.
    pub task: &'a str,
    /// Tool catalog description.
    pub tools: &'a str,
    /// Task metadata of the other siblings, in id order.
    pub sibling_tasks: Vec<NodeBrief>,
    /// The parent's own task metadata, when a parent exists.
    pub parent_task: Option<NodeBrief>,
    /// Working-memory snapshot: results already produced in this group.
    pub prior_results: &'a BTreeMap<String, String>,
    /// Free-form extra context (unused by the core itself).
    pub extra: Option<&'a str>,
}

/// Context gathered for a decomposition.
#[derive(Debug, Clone)]
pub struct DecomposeRequest<'a> {
    /// The node being split.
    pub parent_task: &'a str,
    /// The node's own parent, when one exists.
    pub uplevel_context: Option<NodeBrief>,
    /// Text carried on the edge that routed here (the divide reason).
    pub former_result: Option<&'a str>,
    /// Tool catalog description.
    pub tools: &'a str,
}

/// External decision-making collaborator, one method per component.
pub trait Reasoner {
    /// Produce a raw per-node decision for the conqueror.
    fn decide(&self, request: &DecideRequest<'_>) -> Result<RawDecision>;

    /// Produce subtask specs (or a refusal) for the divider.
    fn decompose(&self, request: &DecomposeRequest<'_>) -> Result<RawDecomposition>;

    /// Produce a short diagnostic for a failed tool call, for the rescue.
    fn diagnose(&self, task: &str, failed_detail: &str) -> Result<String>;

    /// Synthesize the final answer from the root task and the last result.
    fn conclude(&self, root_task: &str, last_result: &str) -> Result<String>;
}
