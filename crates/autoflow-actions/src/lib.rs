//! Built-in action library
//!
//! Simulated versions of the actions the AutoFlow editor offers: a GitHub
//! trigger, an LLM summary step and chat notifications, plus debugging and
//! timing helpers. They stand in for the real integrations behind the same
//! dispatch interface.

mod debug;
mod demo;
mod github;
mod notify;
mod summary;
mod time;

pub use debug::DebugAction;
pub use demo::demo_graph;
pub use github::GithubTriggerAction;
pub use notify::{DiscordMessageAction, SlackMessageAction};
pub use summary::SummaryAction;
pub use time::DelayAction;

use autoflow_core::{ActionContext, ActionError};
use autoflow_runtime::ActionRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Latency the simulated integrations add to every call.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1000);

/// Register all built-in actions with a registry
pub fn register_all(registry: &mut ActionRegistry) {
    register_all_with_latency(registry, DEFAULT_LATENCY);
}

/// Register all built-in actions, simulating `latency` per external call
pub fn register_all_with_latency(registry: &mut ActionRegistry, latency: Duration) {
    registry.register_pattern("github.*", Arc::new(GithubTriggerAction::new(latency)));
    registry.register(Arc::new(SummaryAction::new(latency)));
    registry.register(Arc::new(SlackMessageAction::new(latency)));
    registry.register(Arc::new(DiscordMessageAction::new(latency)));
    registry.register(Arc::new(DebugAction));
    registry.register(Arc::new(DelayAction));
}

/// Wait out a simulated network round trip, giving up early if the
/// dispatch is abandoned.
pub(crate) async fn simulate_call(ctx: &ActionContext, latency: Duration) -> Result<(), ActionError> {
    if latency.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(latency) => Ok(()),
        _ = ctx.cancellation.cancelled() => Err(ActionError::Cancelled),
    }
}
