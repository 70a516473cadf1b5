use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionFailure, ActionMetadata, Value};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Output of the fallback handler for unregistered action types.
pub const NOOP_RESULT: &str = "no-op completed";

/// Registry of action handlers, keyed by action type.
///
/// Lookup order: exact registration, then the longest matching pattern,
/// then the no-op fallback.
pub struct ActionRegistry {
    exact: HashMap<String, Arc<dyn Action>>,
    /// `(prefix, handler)` pairs registered with a trailing `*`.
    patterns: Vec<(String, Arc<dyn Action>)>,
    fallback: Arc<dyn Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: Vec::new(),
            fallback: Arc::new(NoopAction),
        }
    }

    /// Register a handler under its own action type
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let action_type = action.action_type().to_string();
        self.register_as(action_type, action);
    }

    /// Register a handler under an explicit action type
    pub fn register_as(&mut self, action_type: impl Into<String>, action: Arc<dyn Action>) {
        let action_type = action_type.into();
        tracing::info!("Registering action type: {}", action_type);
        self.exact.insert(action_type, action);
    }

    /// Register a handler for every type matching `pattern`.
    ///
    /// `"github.*"` matches any type starting with `github.`, a bare `"*"`
    /// matches everything. A pattern without a trailing `*` is an exact
    /// registration.
    pub fn register_pattern(&mut self, pattern: &str, action: Arc<dyn Action>) {
        match pattern.strip_suffix('*') {
            Some(prefix) => {
                tracing::info!("Registering action pattern: {}", pattern);
                self.patterns.retain(|(p, _)| p != prefix);
                self.patterns.push((prefix.to_string(), action));
            }
            None => self.register_as(pattern, action),
        }
    }

    /// Handler that will serve `action_type`.
    pub fn resolve(&self, action_type: &str) -> &Arc<dyn Action> {
        if let Some(action) = self.exact.get(action_type) {
            return action;
        }
        self.patterns
            .iter()
            .filter(|(prefix, _)| action_type.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, action)| action)
            .unwrap_or(&self.fallback)
    }

    pub fn is_registered(&self, action_type: &str) -> bool {
        !Arc::ptr_eq(self.resolve(action_type), &self.fallback)
    }

    /// Run the handler for `ctx.action_type`, bounded by `timeout`.
    ///
    /// Handler errors and timeouts come back as [`ActionFailure`]; on timeout
    /// the context's cancellation token fires before the call is dropped.
    pub async fn dispatch(
        &self,
        ctx: ActionContext,
        timeout: Duration,
    ) -> Result<Value, ActionFailure> {
        let action_type = ctx.action_type.clone();
        let cancellation = ctx.cancellation.clone();
        let action = self.resolve(&action_type);

        tracing::debug!(
            "Dispatching node {} as {} (handler {})",
            ctx.node_id,
            action_type,
            action.action_type()
        );

        match tokio::time::timeout(timeout, action.execute(ctx)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ActionFailure::failed(action_type, e.to_string())),
            Err(_) => {
                cancellation.cancel();
                Err(ActionFailure::TimedOut {
                    action_type,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Registered types and patterns, sorted
    pub fn list_action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .exact
            .keys()
            .cloned()
            .chain(self.patterns.iter().map(|(prefix, _)| format!("{}*", prefix)))
            .collect();
        types.sort();
        types
    }

    /// Metadata for a registered type or pattern as listed by [`Self::list_action_types`].
    pub fn get_metadata(&self, action_type: &str) -> Option<ActionMetadata> {
        if let Some(action) = self.exact.get(action_type) {
            return Some(action.metadata());
        }
        let prefix = action_type.strip_suffix('*')?;
        self.patterns
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, action)| action.metadata())
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback for action types nobody registered.
struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    fn action_type(&self) -> &str {
        "noop"
    }

    async fn execute(&self, _ctx: ActionContext) -> Result<Value, ActionError> {
        Ok(json!({ "result": NOOP_RESULT }))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Completes immediately without doing anything".to_string(),
            category: "core".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Action for Named {
        fn action_type(&self) -> &str {
            self.0
        }

        async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
            Ok(json!({ "handler": self.0, "dispatched_as": ctx.action_type }))
        }
    }

    struct Failing;

    #[async_trait]
    impl Action for Failing {
        fn action_type(&self) -> &str {
            "always.fails"
        }

        async fn execute(&self, _ctx: ActionContext) -> Result<Value, ActionError> {
            Err(ActionError::ExecutionFailed("upstream returned 500".into()))
        }
    }

    struct Stuck;

    #[async_trait]
    impl Action for Stuck {
        fn action_type(&self) -> &str {
            "stuck"
        }

        async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
            ctx.cancellation.cancelled().await;
            Err(ActionError::Cancelled)
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Named("slack.send_message")));
        registry.register_pattern("github.*", Arc::new(Named("github")));
        registry.register_pattern("github.issue*", Arc::new(Named("github.issue")));
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(Stuck));
        registry
    }

    async fn run(registry: &ActionRegistry, action_type: &str) -> Result<Value, ActionFailure> {
        registry
            .dispatch(ActionContext::new("n", action_type), Duration::from_secs(5))
            .await
    }

    #[tokio::test]
    async fn exact_match_wins() {
        let out = run(&registry(), "slack.send_message").await.unwrap();
        assert_eq!(out["handler"], "slack.send_message");
    }

    #[tokio::test]
    async fn longest_pattern_wins() {
        let registry = registry();
        let out = run(&registry, "github.issue_opened").await.unwrap();
        assert_eq!(out["handler"], "github.issue");
        assert_eq!(out["dispatched_as"], "github.issue_opened");

        let out = run(&registry, "github.star_created").await.unwrap();
        assert_eq!(out["handler"], "github");
    }

    #[tokio::test]
    async fn unregistered_type_falls_back_to_noop() {
        let registry = registry();
        assert!(!registry.is_registered("Trigger: New Issue"));
        let out = run(&registry, "Trigger: New Issue").await.unwrap();
        assert_eq!(out, json!({ "result": NOOP_RESULT }));
    }

    #[tokio::test]
    async fn handler_error_becomes_failure() {
        let err = run(&registry(), "always.fails").await.unwrap_err();
        assert_eq!(
            err,
            ActionFailure::failed("always.fails", "Execution failed: upstream returned 500")
        );
    }

    #[tokio::test]
    async fn timeout_is_reported_separately() {
        let registry = registry();
        let ctx = ActionContext::new("n", "stuck");
        let token = ctx.cancellation.clone();

        let err = registry
            .dispatch(ctx, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ActionFailure::TimedOut {
                action_type: "stuck".into(),
                timeout_ms: 20,
            }
        );
        assert!(token.is_cancelled());
    }

    #[test]
    fn listing_includes_patterns() {
        let registry = registry();
        assert_eq!(
            registry.list_action_types(),
            vec![
                "always.fails",
                "github.*",
                "github.issue*",
                "slack.send_message",
                "stuck",
            ]
        );
        assert!(registry.get_metadata("github.*").is_some());
        assert!(registry.get_metadata("github.issue_opened").is_none());
    }
}
