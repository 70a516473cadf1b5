use crate::NodeId;
use std::fmt;
use thiserror::Error;

/// Which end of an edge a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnd {
    Source,
    Target,
}

impl fmt::Display for EdgeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeEnd::Source => f.write_str("source"),
            EdgeEnd::Target => f.write_str("target"),
        }
    }
}

/// Structural problems that make a graph unrunnable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Edge '{edge_id}' references unknown {end} node '{node_id}'")]
    DanglingEdge {
        edge_id: String,
        node_id: NodeId,
        end: EdgeEnd,
    },

    #[error("Edge '{edge_id}' is a self-loop on node '{node_id}'")]
    SelfLoop { edge_id: String, node_id: NodeId },

    #[error("Node '{node_id}' declares config key '{key}' more than once")]
    DuplicateConfigKey { node_id: NodeId, key: String },

    #[error("Select field '{key}' on node '{node_id}' has no options")]
    MissingSelectOptions { node_id: NodeId, key: String },
}

/// The dependency graph contains at least one cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cycle detected between nodes: {}", .nodes.join(", "))]
pub struct CycleDetected {
    /// Ids of the nodes lying on a cycle, sorted ascending.
    pub nodes: Vec<NodeId>,
}

/// Reasons a run is refused before any node executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Invalid graph: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cycle(#[from] CycleDetected),
}

/// Errors raised by an action handler.
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Failure of a single dispatch, as seen by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailure {
    #[error("{action_type}: {message}")]
    Failed { action_type: String, message: String },

    #[error("{action_type}: timed out after {timeout_ms}ms")]
    TimedOut { action_type: String, timeout_ms: u64 },
}

impl ActionFailure {
    pub fn failed(action_type: impl Into<String>, message: impl Into<String>) -> Self {
        ActionFailure::Failed {
            action_type: action_type.into(),
            message: message.into(),
        }
    }

    /// The action type whose dispatch failed.
    pub fn action_type(&self) -> &str {
        match self {
            ActionFailure::Failed { action_type, .. } => action_type,
            ActionFailure::TimedOut { action_type, .. } => action_type,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionFailure::TimedOut { .. })
    }

    /// Line appended to the node's log for this failure.
    pub fn log_line(&self) -> String {
        match self {
            ActionFailure::Failed { message, .. } => format!("Error: {}", message),
            ActionFailure::TimedOut { timeout_ms, .. } => {
                format!("Timed out after {}ms", timeout_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_nodes() {
        let err = CycleDetected {
            nodes: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected between nodes: a, b");
    }

    #[test]
    fn timeout_log_line_is_distinct_from_failure() {
        let failed = ActionFailure::failed("slack.send_message", "rate limited");
        let timed_out = ActionFailure::TimedOut {
            action_type: "slack.send_message".into(),
            timeout_ms: 250,
        };
        assert_eq!(failed.log_line(), "Error: rate limited");
        assert_eq!(timed_out.log_line(), "Timed out after 250ms");
        assert!(timed_out.is_timeout());
        assert_eq!(timed_out.action_type(), "slack.send_message");
    }
}
