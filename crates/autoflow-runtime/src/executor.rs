use crate::registry::ActionRegistry;
use crate::store::ResultStore;
use autoflow_core::{
    ActionContext, ActionFailure, EventBus, ExecutionEvent, ExecutionResult, Graph, GraphIndex,
    NodeId, NodeSpec, NodeStatus, RunError, RunId, RunStatus, Value,
};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use uuid::Uuid;

/// Runs workflow graphs with a ready-queue scheduler.
///
/// A node is dispatched once all of its predecessors succeeded. Independent
/// nodes run concurrently, all at once unless `max_parallel` caps them.
pub struct WorkflowExecutor {
    max_parallel: usize,
    default_timeout: Duration,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: Option<usize>, default_timeout: Duration) -> Self {
        Self {
            max_parallel: max_parallel.map_or(usize::MAX, |n| n.max(1)),
            default_timeout,
        }
    }

    /// Execute `graph` to completion, recording progress in `store`.
    ///
    /// The store is reset first. A malformed or cyclic graph is rejected
    /// before anything is dispatched and leaves the store empty; action
    /// failures are recorded per node and never abort the run.
    ///
    /// Dropping the returned future aborts every in-flight dispatch. Nodes
    /// that were running at that point stay `running` in the store.
    pub async fn execute(
        &self,
        graph: &Graph,
        registry: &Arc<ActionRegistry>,
        store: &ResultStore,
        event_bus: &EventBus,
        input: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let run_id = RunId::new_v4();
        let start_time = Instant::now();

        store.reset().await;

        let index = match Self::prepare(graph) {
            Ok(index) => index,
            Err(e) => {
                tracing::error!("Rejecting run {}: {}", run_id, e);
                event_bus.emit(ExecutionEvent::RunRejected {
                    run_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        store.init(index.node_ids().cloned()).await;

        event_bus.emit(ExecutionEvent::RunStarted {
            run_id,
            node_count: index.len(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting run {} ({} nodes)", run_id, index.len());

        let recorder = RunRecorder {
            run_id,
            store,
            event_bus,
        };
        let status = self
            .execute_dag(graph, &index, registry, &recorder, input, cancel)
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        event_bus.emit(ExecutionEvent::RunCompleted {
            run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!("Run {} finished with status {} in {}ms", run_id, status, duration_ms);

        Ok(RunReport {
            run_id,
            status,
            results: store.snapshot().await,
            duration_ms,
        })
    }

    /// Validate the graph and make sure it can be ordered.
    fn prepare(graph: &Graph) -> Result<GraphIndex, RunError> {
        graph.validate()?;
        let index = GraphIndex::build(graph);
        index.topological_order()?;
        Ok(index)
    }

    async fn execute_dag(
        &self,
        graph: &Graph,
        index: &GraphIndex,
        registry: &Arc<ActionRegistry>,
        recorder: &RunRecorder<'_>,
        input: Option<Value>,
        cancel: &CancellationToken,
    ) -> RunStatus {
        let nodes: HashMap<&str, &NodeSpec> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut states: HashMap<NodeId, NodeStatus> = index
            .node_ids()
            .map(|id| (id.clone(), NodeStatus::Pending))
            .collect();
        // Predecessors that have not succeeded yet.
        let mut unresolved: HashMap<NodeId, usize> = index
            .node_ids()
            .map(|id| (id.clone(), index.in_degree(id)))
            .collect();
        let mut outputs: HashMap<NodeId, Value> = HashMap::new();
        let mut ready: VecDeque<NodeId> = index.roots().into_iter().collect();
        let mut running = FuturesUnordered::new();
        let mut cancelled = false;
        let mut failed = false;

        loop {
            if !cancelled && cancel.is_cancelled() {
                tracing::warn!("Run {} cancelled; no further nodes will start", recorder.run_id);
                cancelled = true;
            }

            while !cancelled && running.len() < self.max_parallel {
                let Some(node_id) = ready.pop_front() else {
                    break;
                };
                let Some(node) = nodes.get(node_id.as_str()).copied() else {
                    continue;
                };

                let node_input = Self::collect_input(&node_id, index, &outputs, &input);
                let ctx = ActionContext {
                    node_id: node_id.clone(),
                    label: node.label.clone(),
                    action_type: node.action_type.clone(),
                    input: node_input,
                    config: node.config.clone(),
                    events: recorder.event_bus.create_emitter(recorder.run_id, node_id.clone()),
                    cancellation: CancellationToken::new(),
                };
                let timeout = node
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.default_timeout);

                states.insert(node_id.clone(), NodeStatus::Running);
                recorder.start(node).await;

                let registry = Arc::clone(registry);
                let action_type = node.action_type.clone();
                let task = AbortOnDropHandle::new(tokio::spawn(async move {
                    let start = Instant::now();
                    let result = registry.dispatch(ctx, timeout).await;
                    (result, start.elapsed().as_millis() as u64)
                }));
                running.push(async move { (node_id, action_type, task.await) });
            }

            if running.is_empty() {
                break;
            }

            let finished = tokio::select! {
                finished = running.next() => finished,
                _ = cancel.cancelled(), if !cancelled => continue,
            };
            let Some((node_id, action_type, joined)) = finished else {
                break;
            };

            let outcome = match joined {
                Ok((result, duration_ms)) => {
                    tracing::debug!("Node {} returned after {}ms", node_id, duration_ms);
                    result
                }
                Err(e) => Err(ActionFailure::failed(
                    action_type,
                    format!("handler panicked: {}", e),
                )),
            };

            match outcome {
                Ok(output) => {
                    tracing::info!("Node {} succeeded", node_id);
                    recorder.succeed(&node_id, &output).await;
                    states.insert(node_id.clone(), NodeStatus::Success);
                    outputs.insert(node_id.clone(), output);

                    for next in index.successors(&node_id) {
                        let Some(count) = unresolved.get_mut(next) else {
                            continue;
                        };
                        *count = count.saturating_sub(1);
                        if *count == 0 && states.get(next) == Some(&NodeStatus::Pending) {
                            ready.push_back(next.clone());
                        }
                    }
                }
                Err(failure) => {
                    if failure.is_timeout() {
                        tracing::warn!("Node {} timed out: {}", node_id, failure);
                    } else {
                        tracing::error!("Node {} failed: {}", node_id, failure);
                    }
                    failed = true;
                    recorder.fail(&node_id, &failure).await;
                    states.insert(node_id.clone(), NodeStatus::Error);
                    Self::skip_descendants(&node_id, index, &mut states, recorder).await;
                }
            }
        }

        // Only a cancelled run can leave nodes that never started.
        let mut never_started: Vec<&NodeId> = states
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(id, _)| id)
            .collect();
        never_started.sort();
        for node_id in &never_started {
            recorder
                .skip(node_id, "Skipped: run cancelled".to_string())
                .await;
        }

        if failed {
            RunStatus::Error
        } else if !never_started.is_empty() {
            RunStatus::Cancelled
        } else {
            RunStatus::Success
        }
    }

    /// Input for a node: the run input for roots, the predecessor's output
    /// for a single predecessor, otherwise all outputs ordered by predecessor id.
    fn collect_input(
        node_id: &str,
        index: &GraphIndex,
        outputs: &HashMap<NodeId, Value>,
        run_input: &Option<Value>,
    ) -> Option<Value> {
        let predecessors: Vec<&NodeId> = index.predecessors(node_id).collect();
        match predecessors.as_slice() {
            [] => run_input.clone(),
            [only] => outputs.get(*only).cloned(),
            many => Some(Value::Array(
                many.iter()
                    .filter_map(|id| outputs.get(*id).cloned())
                    .collect(),
            )),
        }
    }

    /// Mark every pending node reachable from `failed` as skipped.
    async fn skip_descendants(
        failed: &str,
        index: &GraphIndex,
        states: &mut HashMap<NodeId, NodeStatus>,
        recorder: &RunRecorder<'_>,
    ) {
        let mut stack: Vec<&NodeId> = index.successors(failed).collect();
        while let Some(node_id) = stack.pop() {
            if states.get(node_id) != Some(&NodeStatus::Pending) {
                continue;
            }
            states.insert(node_id.clone(), NodeStatus::Skipped);
            recorder
                .skip(node_id, format!("Skipped: upstream node {} did not succeed", failed))
                .await;
            stack.extend(index.successors(node_id));
        }
    }
}

/// Writes node transitions to the store and mirrors them on the event bus.
struct RunRecorder<'a> {
    run_id: RunId,
    store: &'a ResultStore,
    event_bus: &'a EventBus,
}

impl RunRecorder<'_> {
    async fn start(&self, node: &NodeSpec) {
        self.transition(&node.id, NodeStatus::Running, None, format!("Started {}...", node.label))
            .await;
    }

    async fn succeed(&self, node_id: &str, output: &Value) {
        self.transition(
            node_id,
            NodeStatus::Success,
            Some(output.clone()),
            format!("Completed: {}", output),
        )
        .await;
    }

    async fn fail(&self, node_id: &str, failure: &ActionFailure) {
        self.transition(node_id, NodeStatus::Error, None, failure.log_line())
            .await;
    }

    async fn skip(&self, node_id: &str, reason: String) {
        tracing::debug!("Node {}: {}", node_id, reason);
        self.transition(node_id, NodeStatus::Skipped, None, reason).await;
    }

    async fn transition(
        &self,
        node_id: &str,
        status: NodeStatus,
        output: Option<Value>,
        line: String,
    ) {
        let updated = self
            .store
            .update(node_id, |result| {
                result.status = status;
                if output.is_some() {
                    result.output = output;
                }
                result.logs.push(line.clone());
            })
            .await;
        if !updated {
            return;
        }

        self.event_bus.emit(ExecutionEvent::NodeStatusChanged {
            run_id: self.run_id,
            node_id: node_id.to_string(),
            status,
            timestamp: Utc::now(),
        });
        self.event_bus.emit(ExecutionEvent::NodeLog {
            run_id: self.run_id,
            node_id: node_id.to_string(),
            line,
            timestamp: Utc::now(),
        });
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub results: BTreeMap<NodeId, ExecutionResult>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn result(&self, node_id: &str) -> Option<&ExecutionResult> {
        self.results.get(node_id)
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.results.get(node_id).map(|r| r.status)
    }

    /// Number of nodes that ended in `status`.
    pub fn count(&self, status: NodeStatus) -> usize {
        self.results.values().filter(|r| r.status == status).count()
    }
}
