use autoflow_core::{ConfigField, Graph, NodeSpec};

/// The starter workflow: a GitHub issue trigger, an LLM summary and a
/// Discord notification, wired in a line.
pub fn demo_graph() -> Graph {
    let mut graph = Graph::new();

    graph.add_node(
        NodeSpec::new("1", "github.issue_opened")
            .with_label("Trigger: New Issue")
            .with_description("When a GitHub issue opens")
            .with_position(250.0, 50.0)
            .with_config(ConfigField::text("repo", "Repository", "tambo/autoflow"))
            .with_config(ConfigField::select(
                "event",
                "Event Type",
                ["Issue Opened", "PR Merged", "Star Created"],
                "Issue Opened",
            )),
    );
    graph.add_node(
        NodeSpec::new("2", "llm.summarize")
            .with_label("Action: Summary")
            .with_description("Summarize using LLM")
            .with_position(250.0, 200.0)
            .with_config(ConfigField::text(
                "prompt",
                "System Prompt",
                "Summarize the issue severity.",
            ))
            .with_config(ConfigField::select(
                "model",
                "Model",
                ["Gemini 1.5 Pro", "Gemini 1.5 Flash"],
                "Gemini 1.5 Pro",
            )),
    );
    graph.add_node(
        NodeSpec::new("3", "discord.send_message")
            .with_label("Discord: Send Message")
            .with_description("Posts a message to a Discord channel")
            .with_position(250.0, 350.0)
            .with_config(ConfigField::text("channel", "Channel ID", "123456789"))
            .with_config(ConfigField::text("botName", "Bot Name", "AutoFlow Bot")),
    );

    graph.connect("1", "2");
    graph.connect("2", "3");
    graph
}
