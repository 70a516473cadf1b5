use crate::{events::EventEmitter, ActionError, ConfigField, FieldValue, NodeId};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Core trait that every dispatchable action implements
#[async_trait]
pub trait Action: Send + Sync {
    /// Type identifier this handler is registered under (e.g. "slack.send_message")
    fn action_type(&self) -> &str;

    /// Run the action. Invoked concurrently for distinct nodes, so any
    /// mutable state needs its own synchronization.
    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError>;

    /// Optional: describe the action for listings
    fn metadata(&self) -> ActionMetadata {
        ActionMetadata::default()
    }
}

/// Everything a handler gets to see about the node it runs for
#[derive(Clone)]
pub struct ActionContext {
    pub node_id: NodeId,
    pub label: String,

    /// Type the node was dispatched under; may differ from the handler's
    /// own type when it was registered by pattern.
    pub action_type: String,

    /// Predecessor output: a single value for one predecessor, an array
    /// ordered by predecessor id for several, `None` for roots without run input.
    pub input: Option<Value>,

    /// Node configuration, passed through untouched.
    pub config: Vec<ConfigField>,

    pub events: EventEmitter,

    /// Fires when the dispatch timed out and is being abandoned.
    pub cancellation: CancellationToken,
}

impl ActionContext {
    pub fn new(node_id: impl Into<NodeId>, action_type: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            label: node_id.clone(),
            events: EventEmitter::detached(node_id.clone()),
            node_id,
            action_type: action_type.into(),
            input: None,
            config: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_config(mut self, config: Vec<ConfigField>) -> Self {
        self.config = config;
        self
    }

    pub fn require_input(&self) -> Result<&Value, ActionError> {
        self.input
            .as_ref()
            .ok_or_else(|| ActionError::MissingInput(self.node_id.clone()))
    }

    pub fn config_value(&self, key: &str) -> Option<&FieldValue> {
        self.config
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.value.as_ref())
    }

    pub fn config_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.config_value(key)
            .and_then(FieldValue::as_str)
            .unwrap_or(default)
    }
}

/// Descriptive metadata about an action type
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    pub description: String,
    pub category: String,
}

impl Default for ActionMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}
