use crate::simulate_call;
use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionMetadata, Value};
use serde_json::json;
use std::time::Duration;

/// Pull a human-readable message out of an upstream output.
///
/// Multi-predecessor inputs arrive as arrays; the first element carrying a
/// summary or message wins.
fn upstream_message(input: Option<&Value>) -> Option<String> {
    match input? {
        Value::Array(items) => items.iter().find_map(|item| upstream_message(Some(item))),
        Value::String(s) => Some(s.clone()),
        value => value
            .get("summary")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Simulated Slack `chat.postMessage`
pub struct SlackMessageAction {
    latency: Duration,
}

impl SlackMessageAction {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Action for SlackMessageAction {
    fn action_type(&self) -> &str {
        "slack.send_message"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let channel = ctx.config_str_or("channel", "#alerts").to_string();
        let message = match upstream_message(ctx.input.as_ref()) {
            Some(text) => format!("🚨 {}", text),
            None => "🚨 Critical Issue: User 'octocat' reported a build failure.".to_string(),
        };

        ctx.events.info(format!("Posting to {}", channel));
        simulate_call(&ctx, self.latency).await?;

        Ok(json!({
            "sentTo": channel,
            "message": message,
            "status": "delivered",
        }))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Post a message to a Slack channel".to_string(),
            category: "notification".to_string(),
        }
    }
}

/// Simulated Discord bot message
pub struct DiscordMessageAction {
    latency: Duration,
}

impl DiscordMessageAction {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn compose(input: Option<&Value>) -> String {
        let raw = input.map(Value::to_string).unwrap_or_default();
        if raw.contains("star") {
            return "🌟 New Star from octocat! Repo: autoflow".to_string();
        }
        upstream_message(input).unwrap_or_else(|| "Notification sent".to_string())
    }
}

#[async_trait]
impl Action for DiscordMessageAction {
    fn action_type(&self) -> &str {
        "discord.send_message"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let channel = ctx.config_str_or("channel", "#general").to_string();
        let bot = ctx.config_str_or("botName", "AutoFlow Bot").to_string();
        let message = Self::compose(ctx.input.as_ref());

        ctx.events.info(format!("{} posting to {}", bot, channel));
        simulate_call(&ctx, self.latency).await?;

        Ok(json!({
            "channel": channel,
            "message": message,
            "status": "sent",
        }))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Post a message to a Discord channel".to_string(),
            category: "notification".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::ConfigField;

    #[tokio::test]
    async fn slack_forwards_upstream_summary() {
        let action = SlackMessageAction::new(Duration::ZERO);
        let ctx = ActionContext::new("3", "slack.send_message")
            .with_input(json!({ "summary": "Build failing on Vercel", "severity": "high" }));

        let out = action.execute(ctx).await.unwrap();

        assert_eq!(out["sentTo"], "#alerts");
        assert_eq!(out["message"], "🚨 Build failing on Vercel");
        assert_eq!(out["status"], "delivered");
    }

    #[tokio::test]
    async fn discord_announces_stars() {
        let action = DiscordMessageAction::new(Duration::ZERO);
        let ctx = ActionContext::new("3", "discord.send_message")
            .with_config(vec![ConfigField::text("channel", "Channel ID", "123456789")])
            .with_input(json!({ "event": "star_created", "sender": "octocat" }));

        let out = action.execute(ctx).await.unwrap();

        assert_eq!(out["channel"], "123456789");
        assert_eq!(out["message"], "🌟 New Star from octocat! Repo: autoflow");
        assert_eq!(out["status"], "sent");
    }

    #[test]
    fn joined_inputs_use_first_message() {
        let input = json!([{ "result": "no-op completed" }, { "summary": "second branch" }]);
        assert_eq!(upstream_message(Some(&input)).as_deref(), Some("second branch"));
        assert_eq!(DiscordMessageAction::compose(None), "Notification sent");
    }
}
