use crate::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle of a node within one run.
///
/// `Pending -> Running -> Success | Error`, or `Pending -> Skipped` for nodes
/// that are never dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

impl NodeStatus {
    /// Whether the node can no longer change state within the run.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Error | NodeStatus::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Error => "error",
            NodeStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Per-node outcome, updated in place as the run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub logs: Vec<String>,
}

impl ExecutionResult {
    pub fn pending(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Pending,
            output: None,
            logs: Vec::new(),
        }
    }
}

/// Aggregate status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    /// Dispatching stopped early on request.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
