use crate::simulate_call;
use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionMetadata, Value};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;

/// Simulated GitHub webhook trigger.
///
/// Registered for `github.*`. Emits a `star_created` event when the node is
/// dispatched as `github.star_created` or its `event` config says
/// "Star Created", an `issue_opened` event otherwise.
pub struct GithubTriggerAction {
    latency: Duration,
}

impl GithubTriggerAction {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn wants_star(ctx: &ActionContext) -> bool {
        ctx.action_type.ends_with("star_created")
            || ctx.config_str_or("event", "").eq_ignore_ascii_case("star created")
    }
}

#[async_trait]
impl Action for GithubTriggerAction {
    fn action_type(&self) -> &str {
        "github.trigger"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let repo = ctx.config_str_or("repo", "autoflow").to_string();
        ctx.events.info(format!("Waiting for GitHub event on {}", repo));

        simulate_call(&ctx, self.latency).await?;

        if Self::wants_star(&ctx) {
            return Ok(json!({
                "event": "star_created",
                "repo": repo,
                "sender": "octocat",
                "starred_at": Utc::now().to_rfc3339(),
            }));
        }

        Ok(json!({
            "event": "issue_opened",
            "repo": repo,
            "issue": {
                "title": "Bug: Build failing on Vercel",
                "body": "I tried deploying but got error 500.",
                "author": "octocat",
            },
        }))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Fires on GitHub repository events (issues, stars)".to_string(),
            category: "trigger".to_string(),
        }
    }
}
