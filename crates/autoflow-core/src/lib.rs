//! Core abstractions for the AutoFlow engine
//!
//! Graph model, validation and indexing, the action contract, run events
//! and the error taxonomy. Everything that executes lives in
//! `autoflow-runtime`.

mod action;
mod error;
pub mod events;
mod field;
mod graph;
mod index;
mod result;

pub use action::{Action, ActionContext, ActionMetadata};
pub use error::{
    ActionError, ActionFailure, CycleDetected, EdgeEnd, RunError, ValidationError,
};
pub use events::*;
pub use field::{ConfigField, FieldKind, FieldValue};
pub use graph::{Edge, Graph, NodeId, NodeSpec, Position};
pub use index::GraphIndex;
pub use result::{ExecutionResult, NodeStatus, RunStatus};

pub use serde_json::Value;
