use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionMetadata, Value};

/// Logs its input and passes it through unchanged
pub struct DebugAction;

#[async_trait]
impl Action for DebugAction {
    fn action_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        tracing::debug!("debug.log on node {}: {:?}", ctx.node_id, ctx.input);
        match &ctx.input {
            Some(Value::Array(items)) => {
                ctx.events.info(format!("DEBUG: {} joined inputs", items.len()));
                for (i, item) in items.iter().enumerate() {
                    ctx.events.info(format!("  [{}] {}", i, item));
                }
            }
            Some(value) => ctx.events.info(format!("DEBUG: {}", value)),
            None => ctx.events.info("DEBUG: (no input)"),
        }

        Ok(ctx.input.unwrap_or(Value::Null))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::{EventBus, ExecutionEvent, NodeEvent, RunId};
    use serde_json::json;

    #[tokio::test]
    async fn passes_input_through_and_reports_it() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let mut ctx = ActionContext::new("dbg", "debug.log").with_input(json!({ "n": 1 }));
        ctx.events = bus.create_emitter(RunId::nil(), "dbg".into());

        let out = DebugAction.execute(ctx).await.unwrap();

        assert_eq!(out, json!({ "n": 1 }));
        match rx.recv().await.unwrap() {
            ExecutionEvent::NodeEvent {
                event: NodeEvent::Info { message },
                ..
            } => assert_eq!(message, r#"DEBUG: {"n":1}"#),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
