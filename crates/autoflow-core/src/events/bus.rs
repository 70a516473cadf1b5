use crate::{NodeId, NodeStatus, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted while a run progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        run_id: RunId,
        node_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// The graph was refused before any node ran; no per-node results follow.
    RunRejected {
        run_id: RunId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeStatusChanged {
        run_id: RunId,
        node_id: NodeId,
        status: NodeStatus,
        timestamp: DateTime<Utc>,
    },
    /// A line appended to a node's log in the result store.
    NodeLog {
        run_id: RunId,
        node_id: NodeId,
        line: String,
        timestamp: DateTime<Utc>,
    },
    NodeEvent {
        run_id: RunId,
        node_id: NodeId,
        event: NodeEvent,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        status: RunStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            ExecutionEvent::RunStarted { run_id, .. }
            | ExecutionEvent::RunRejected { run_id, .. }
            | ExecutionEvent::NodeStatusChanged { run_id, .. }
            | ExecutionEvent::NodeLog { run_id, .. }
            | ExecutionEvent::NodeEvent { run_id, .. }
            | ExecutionEvent::RunCompleted { run_id, .. } => *run_id,
        }
    }
}

/// Messages an action handler reports while it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum NodeEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Event emitter handed to action handlers for real-time updates
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    node_id: NodeId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(run_id: RunId, node_id: NodeId, sender: broadcast::Sender<ExecutionEvent>) -> Self {
        Self {
            run_id,
            node_id,
            sender,
        }
    }

    /// Emitter whose events go nowhere.
    pub fn detached(node_id: impl Into<NodeId>) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self::new(Uuid::nil(), node_id.into(), sender)
    }

    pub fn emit(&self, event: NodeEvent) {
        let _ = self.sender.send(ExecutionEvent::NodeEvent {
            run_id: self.run_id,
            node_id: self.node_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Warning {
            message: message.into(),
        });
    }

    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(NodeEvent::Progress { percent, message });
    }
}

/// Broadcast bus observers subscribe to
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Send to current subscribers; dropped silently when nobody listens.
    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, run_id: RunId, node_id: NodeId) -> EventEmitter {
        EventEmitter::new(run_id, node_id, self.sender.clone())
    }
}
