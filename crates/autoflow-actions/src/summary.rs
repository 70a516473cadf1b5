use crate::simulate_call;
use async_trait::async_trait;
use autoflow_core::{Action, ActionContext, ActionError, ActionMetadata, Value};
use serde_json::json;
use std::time::Duration;

const SEVERE_WORDS: [&str; 4] = ["error", "fail", "crash", "outage"];

/// Simulated LLM summarization step
pub struct SummaryAction {
    latency: Duration,
}

impl SummaryAction {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// One-line digest of whatever the upstream node produced.
    fn summarize(input: &Value) -> String {
        if let Some(issue) = input.get("issue") {
            let author = issue["author"].as_str().unwrap_or("someone");
            let title = issue["title"].as_str().unwrap_or("an untitled issue");
            return format!("User '{}' reported an issue: {}", author, title);
        }

        if input["event"] == "star_created" {
            let sender = input["sender"].as_str().unwrap_or("someone");
            let repo = input["repo"].as_str().unwrap_or("the repository");
            return format!("User '{}' starred {}.", sender, repo);
        }

        match input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn severity(input: &Value) -> &'static str {
        let text = input.to_string().to_lowercase();
        if SEVERE_WORDS.iter().any(|w| text.contains(w)) {
            "high"
        } else {
            "low"
        }
    }
}

#[async_trait]
impl Action for SummaryAction {
    fn action_type(&self) -> &str {
        "llm.summarize"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let model = ctx.config_str_or("model", "Gemini 1.5 Pro").to_string();
        let input = ctx.require_input()?;
        ctx.events.info(format!("Summarizing with {}", model));

        simulate_call(&ctx, self.latency).await?;

        Ok(json!({
            "summary": Self::summarize(input),
            "severity": Self::severity(input),
            "model": model,
        }))
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            description: "Summarize the previous step's output with an LLM".to_string(),
            category: "ai".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summarizes_issue_events() {
        let action = SummaryAction::new(Duration::ZERO);
        let ctx = ActionContext::new("2", "llm.summarize").with_input(json!({
            "event": "issue_opened",
            "issue": {
                "title": "Bug: Build failing on Vercel",
                "body": "I tried deploying but got error 500.",
                "author": "octocat",
            },
        }));

        let out = action.execute(ctx).await.unwrap();

        assert_eq!(
            out["summary"],
            "User 'octocat' reported an issue: Bug: Build failing on Vercel"
        );
        assert_eq!(out["severity"], "high");
        assert_eq!(out["model"], "Gemini 1.5 Pro");
    }

    #[tokio::test]
    async fn star_events_are_low_severity() {
        let action = SummaryAction::new(Duration::ZERO);
        let ctx = ActionContext::new("2", "llm.summarize").with_input(json!({
            "event": "star_created",
            "repo": "autoflow",
            "sender": "octocat",
        }));

        let out = action.execute(ctx).await.unwrap();

        assert_eq!(out["summary"], "User 'octocat' starred autoflow.");
        assert_eq!(out["severity"], "low");
    }

    #[tokio::test]
    async fn missing_input_is_rejected() {
        let action = SummaryAction::new(Duration::ZERO);
        let ctx = ActionContext::new("2", "llm.summarize");

        assert!(matches!(
            action.execute(ctx).await,
            Err(ActionError::MissingInput(id)) if id == "2"
        ));
    }
}
