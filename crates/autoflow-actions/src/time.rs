use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionMetadata, FieldValue, Value};
use tokio::time::{sleep, Duration};

/// Delay for `delay_ms` (config, default one second), then pass the input on
pub struct DelayAction;

#[async_trait]
impl Action for DelayAction {
    fn action_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let delay_ms = match ctx.config_value("delay_ms") {
            None => 1000,
            Some(FieldValue::Number(n)) if *n >= 0.0 => *n as u64,
            Some(other) => {
                return Err(ActionError::Configuration(format!(
                    "delay_ms must be a non-negative number, got {:?}",
                    other
                )))
            }
        };

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(ActionError::Cancelled),
        }
        ctx.events.progress(100.0, Some(format!("Waited {}ms", delay_ms)));

        Ok(ctx.input.unwrap_or(Value::Null))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Delay execution for the configured milliseconds".to_string(),
            category: "time".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::{ConfigField, EventBus, ExecutionEvent, NodeEvent, RunId};
    use serde_json::json;

    #[tokio::test]
    async fn waits_then_passes_input_through() {
        let ctx = ActionContext::new("wait", "time.delay")
            .with_config(vec![ConfigField::number("delay_ms", "Delay (ms)", 5.0)])
            .with_input(json!("payload"));

        let out = DelayAction.execute(ctx).await.unwrap();
        assert_eq!(out, json!("payload"));
    }

    #[tokio::test]
    async fn reports_progress_when_done() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let mut ctx = ActionContext::new("wait", "time.delay")
            .with_config(vec![ConfigField::number("delay_ms", "Delay (ms)", 1.0)]);
        ctx.events = bus.create_emitter(RunId::nil(), "wait".into());

        DelayAction.execute(ctx).await.unwrap();

        let mut last_progress = None;
        while let Ok(event) = rx.try_recv() {
            if let ExecutionEvent::NodeEvent {
                event: NodeEvent::Progress { percent, message },
                ..
            } = event
            {
                last_progress = Some((percent, message));
            }
        }
        assert_eq!(last_progress, Some((100.0, Some("Waited 1ms".to_string()))));
    }

    #[tokio::test]
    async fn rejects_non_numeric_delay() {
        let ctx = ActionContext::new("wait", "time.delay")
            .with_config(vec![ConfigField::text("delay_ms", "Delay (ms)", "soon")]);

        assert!(matches!(
            DelayAction.execute(ctx).await,
            Err(ActionError::Configuration(_))
        ));
    }
}
