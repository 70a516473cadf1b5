mod bus;

pub use bus::{EventBus, EventEmitter, ExecutionEvent, NodeEvent, RunId};
