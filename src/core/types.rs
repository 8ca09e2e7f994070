//! Shared deterministic types for the runner core.
//!
//! These types define the stable contracts between the core components and
//! the external collaborators. They must remain deterministic and free of
//! I/O so every transition is replayable from persisted state alone.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One named tool invocation requested by the reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Raw per-node decision as produced by the reasoner.
///
/// Exactly one field is expected to be set. Historically more than one could
/// appear; [`RawDecision::normalize`] applies the fixed priority below rather
/// than treating that as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecision {
    pub agent_answer: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub divide: Option<String>,
}

/// Normalized decision, in priority order: answer, tool call, divide.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Direct answer text for the node.
    Answer(String),
    /// Invoke one external tool.
    Invoke(ToolCall),
    /// Split the node into subtasks; carries the stated reason.
    Divide(String),
}

/// The reasoner produced none of the expected decision shapes.
///
/// Surfaced to the driver's bounded retry rather than handled locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDecision;

impl fmt::Display for MalformedDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decision contains none of agent_answer, tool_call, divide"
        )
    }
}

impl std::error::Error for MalformedDecision {}

impl RawDecision {
    /// Collapse the raw shape into one [`Decision`].
    ///
    /// Priority is `agent_answer` > `tool_call` > `divide`; extra populated
    /// fields are discarded and logged as an anomaly, not treated as an
    /// error.
    pub fn normalize(self) -> Result<Decision, MalformedDecision> {
        let populated = usize::from(self.agent_answer.is_some())
            + usize::from(self.tool_call.is_some())
            + usize::from(self.divide.is_some());
        if populated > 1 {
            warn!(populated, "decision has multiple outcome fields; honoring the first by priority");
        }

        if let Some(answer) = self.agent_answer {
            return Ok(Decision::Answer(answer));
        }
        if let Some(call) = self.tool_call {
            return Ok(Decision::Invoke(call));
        }
        if let Some(reason) = self.divide {
            return Ok(Decision::Divide(reason));
        }
        Err(MalformedDecision)
    }
}

/// Raw decomposition output as produced by the reasoner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecomposition {
    pub tasks: Option<Vec<crate::tree::SubtaskSpec>>,
    pub failed_reason: Option<String>,
}

/// Normalized decomposition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decomposition {
    Tasks(Vec<crate::tree::SubtaskSpec>),
    Failed(String),
}

impl RawDecomposition {
    /// `tasks` wins over `failed_reason`; an empty task list and an entirely
    /// empty shape both count as failure.
    pub fn normalize(self) -> Decomposition {
        match self.tasks {
            Some(tasks) if !tasks.is_empty() => Decomposition::Tasks(tasks),
            _ => Decomposition::Failed(
                self.failed_reason
                    .unwrap_or_else(|| "decomposition produced no tasks".to_string()),
            ),
        }
    }
}

/// Named control edge returned by the conqueror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConquerEdge {
    /// The node produced a result; traversal advances.
    Success,
    /// The node is too complex and must be divided.
    Complex,
    /// A tool invocation failed; eligible for one rescue attempt.
    Failed,
}

/// Metadata about a node exposed as reasoning context. Never carries results;
/// working memory is the only channel for those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBrief {
    pub task: String,
    pub criticism: String,
    pub milestones: Vec<String>,
}

impl NodeBrief {
    pub fn from_node(node: &crate::tree::TaskNode) -> Self {
        Self {
            task: node.task.clone(),
            criticism: node.criticism.clone(),
            milestones: node.milestones.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_prefers_answer_over_other_fields() {
        let raw = RawDecision {
            agent_answer: Some("done".to_string()),
            tool_call: Some(ToolCall {
                name: "search".to_string(),
                arguments: json!({}),
            }),
            divide: Some("too big".to_string()),
        };
        assert_eq!(
            raw.normalize().expect("decision"),
            Decision::Answer("done".to_string())
        );
    }

    #[test]
    fn normalize_prefers_tool_call_over_divide() {
        let raw = RawDecision {
            agent_answer: None,
            tool_call: Some(ToolCall {
                name: "search".to_string(),
                arguments: json!({"q": "x"}),
            }),
            divide: Some("too big".to_string()),
        };
        match raw.normalize().expect("decision") {
            Decision::Invoke(call) => assert_eq!(call.name, "search"),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn normalize_empty_decision_is_malformed() {
        let raw = RawDecision::default();
        assert_eq!(raw.normalize().expect_err("malformed"), MalformedDecision);
    }

    #[test]
    fn raw_decision_deserializes_with_missing_fields() {
        let raw: RawDecision =
            serde_json::from_value(json!({"divide": "needs steps"})).expect("parse");
        assert_eq!(
            raw.normalize().expect("decision"),
            Decision::Divide("needs steps".to_string())
        );
    }

    #[test]
    fn decomposition_with_empty_tasks_fails() {
        let raw = RawDecomposition {
            tasks: Some(Vec::new()),
            failed_reason: None,
        };
        match raw.normalize() {
            Decomposition::Failed(reason) => assert!(reason.contains("no tasks")),
            other => panic!("unexpected decomposition {other:?}"),
        }
    }

    #[test]
    fn decomposition_failed_reason_passes_through() {
        let raw = RawDecomposition {
            tasks: None,
            failed_reason: Some("cannot split".to_string()),
        };
        assert_eq!(
            raw.normalize(),
            Decomposition::Failed("cannot split".to_string())
        );
    }
}
