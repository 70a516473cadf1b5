use autoflow_core::{ExecutionResult, NodeId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Per-run mapping from node id to its [`ExecutionResult`].
///
/// Shared behind an `Arc` so observers can read while a run is in flight.
/// Only the executor writes, and it never has two writers for the same node.
#[derive(Default)]
pub struct ResultStore {
    entries: RwLock<BTreeMap<NodeId, ExecutionResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, node_id: &str) -> Option<ExecutionResult> {
        self.entries.read().await.get(node_id).cloned()
    }

    /// Point-in-time copy of every entry.
    pub async fn snapshot(&self) -> BTreeMap<NodeId, ExecutionResult> {
        self.entries.read().await.clone()
    }

    /// Drop everything left over from a previous run.
    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Create one pending entry per node.
    pub(crate) async fn init(&self, node_ids: impl IntoIterator<Item = NodeId>) {
        let mut entries = self.entries.write().await;
        for node_id in node_ids {
            entries.insert(node_id.clone(), ExecutionResult::pending(node_id));
        }
    }

    /// Mutate a node's entry in place. Returns `false` for unknown nodes.
    pub(crate) async fn update<F>(&self, node_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ExecutionResult),
    {
        match self.entries.write().await.get_mut(node_id) {
            Some(result) => {
                f(result);
                true
            }
            None => false,
        }
    }
}
