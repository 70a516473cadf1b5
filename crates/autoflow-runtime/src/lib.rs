//! Workflow execution runtime
//!
//! Action dispatch, the per-run result store and the ready-queue executor
//! that drives a graph to completion.

mod executor;
mod registry;
mod runtime;
mod store;

pub use executor::{RunReport, WorkflowExecutor};
pub use registry::{ActionRegistry, NOOP_RESULT};
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use store::ResultStore;
