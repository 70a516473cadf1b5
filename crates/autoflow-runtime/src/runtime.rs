use crate::{registry::ActionRegistry, ResultStore, RunReport, WorkflowExecutor};
use autoflow_core::{EventBus, ExecutionEvent, Graph, RunError, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

/// Main entry point for running workflow graphs
pub struct FlowRuntime {
    registry: Arc<ActionRegistry>,
    executor: WorkflowExecutor,
    event_bus: Arc<EventBus>,
    store: Arc<ResultStore>,
    /// Runs share `store`, so only one may be in flight at a time.
    run_lock: Mutex<()>,
}

impl FlowRuntime {
    /// Create a runtime with default settings and an empty registry
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ActionRegistry::new()), config)
    }

    /// Create a runtime around a pre-populated registry
    pub fn with_registry(registry: Arc<ActionRegistry>, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(config.max_parallel_nodes, config.node_timeout());
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            executor,
            event_bus,
            store: Arc::new(ResultStore::new()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Result store of the current (or most recent) run
    pub fn results(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    /// Execute a graph to completion
    pub async fn execute(&self, graph: &Graph, input: Option<Value>) -> Result<RunReport, RunError> {
        self.execute_with_cancel(graph, input, CancellationToken::new())
            .await
    }

    /// Execute a graph; cancelling `cancel` stops new nodes from starting
    pub async fn execute_with_cancel(
        &self,
        graph: &Graph,
        input: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        let _guard = self.run_lock.lock().await;
        self.executor
            .execute(graph, &self.registry, &self.store, &self.event_bus, input, &cancel)
            .await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cap on concurrently running nodes; `None` dispatches every ready node.
    pub max_parallel_nodes: Option<usize>,
    pub event_buffer_size: usize,
    /// Dispatch bound for nodes that do not set their own `timeoutMs`.
    pub node_timeout_ms: u64,
}

impl RuntimeConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: None,
            event_buffer_size: 1000,
            node_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"node_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.node_timeout(), Duration::from_millis(500));
        assert_eq!(config.max_parallel_nodes, None);
        assert_eq!(config.event_buffer_size, 1000);
    }

    #[test]
    fn parallelism_cap_is_opt_in() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"max_parallel_nodes": 4}"#).unwrap();
        assert_eq!(config.max_parallel_nodes, Some(4));
        assert_eq!(config.node_timeout_ms, 30_000);
    }
}
