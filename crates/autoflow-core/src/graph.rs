use crate::{ConfigField, EdgeEnd, FieldKind, FieldValue, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type NodeId = String;

/// Complete workflow graph, as produced by the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add an edge `source -> target` with a generated `e<source>-<target>` id.
    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        let source = source.into();
        let target = target.into();
        self.edges.push(Edge {
            id: format!("e{}-{}", source, target),
            source,
            target,
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check structural well-formedness.
    ///
    /// Returns the first violation found: duplicate node ids, then edges
    /// pointing at unknown nodes or looping onto their own source, then
    /// per-node config problems.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut ids: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(ValidationError::DuplicateNodeId(node.id.clone()));
            }
        }

        for edge in &self.edges {
            if !ids.contains(edge.source.as_str()) {
                return Err(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: edge.source.clone(),
                    end: EdgeEnd::Source,
                });
            }
            if !ids.contains(edge.target.as_str()) {
                return Err(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: edge.target.clone(),
                    end: EdgeEnd::Target,
                });
            }
            if edge.source == edge.target {
                return Err(ValidationError::SelfLoop {
                    edge_id: edge.id.clone(),
                    node_id: edge.source.clone(),
                });
            }
        }

        for node in &self.nodes {
            node.validate_config()?;
        }

        Ok(())
    }
}

/// Node specification in a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: NodeId,
    pub label: String,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Overrides the runtime's default dispatch timeout for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub config: Vec<ConfigField>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, action_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            action_type: action_type.into(),
            description: None,
            position: None,
            timeout_ms: None,
            config: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_config(mut self, field: ConfigField) -> Self {
        self.config.push(field);
        self
    }

    pub fn config_value(&self, key: &str) -> Option<&FieldValue> {
        self.config
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.value.as_ref())
    }

    fn validate_config(&self) -> Result<(), ValidationError> {
        let mut keys = HashSet::with_capacity(self.config.len());
        for field in &self.config {
            if !keys.insert(field.key.as_str()) {
                return Err(ValidationError::DuplicateConfigKey {
                    node_id: self.id.clone(),
                    key: field.key.clone(),
                });
            }
            if field.kind == FieldKind::Select && field.options.is_none() {
                return Err(ValidationError::MissingSelectOptions {
                    node_id: self.id.clone(),
                    key: field.key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Directed dependency: run `target` after `source` and feed it the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_node(NodeSpec::new(*id, "noop"));
        }
        for (source, target) in edges {
            graph.connect(*source, *target);
        }
        graph
    }

    #[test]
    fn well_formed_graph_validates() {
        let graph = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn empty_graph_is_valid() {
        assert_eq!(Graph::new().validate(), Ok(()));
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let graph = graph(&["a", "a"], &[]);
        assert_eq!(
            graph.validate(),
            Err(ValidationError::DuplicateNodeId("a".into()))
        );
    }

    #[test]
    fn dangling_target_is_rejected() {
        let graph = graph(&["a"], &[("a", "ghost")]);
        assert_eq!(
            graph.validate(),
            Err(ValidationError::DanglingEdge {
                edge_id: "ea-ghost".into(),
                node_id: "ghost".into(),
                end: EdgeEnd::Target,
            })
        );
    }

    #[test]
    fn dangling_source_is_rejected() {
        let graph = graph(&["b"], &[("ghost", "b")]);
        assert!(matches!(
            graph.validate(),
            Err(ValidationError::DanglingEdge { end: EdgeEnd::Source, .. })
        ));
    }

    #[test]
    fn self_loop_is_rejected() {
        let graph = graph(&["a", "b"], &[("a", "b"), ("b", "b")]);
        assert_eq!(
            graph.validate(),
            Err(ValidationError::SelfLoop {
                edge_id: "eb-b".into(),
                node_id: "b".into(),
            })
        );
    }

    #[test]
    fn duplicate_config_key_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node(
            NodeSpec::new("a", "noop")
                .with_config(ConfigField::text("repo", "Repository", "x/y"))
                .with_config(ConfigField::text("repo", "Repository", "x/z")),
        );
        assert_eq!(
            graph.validate(),
            Err(ValidationError::DuplicateConfigKey {
                node_id: "a".into(),
                key: "repo".into(),
            })
        );
    }

    #[test]
    fn select_without_options_is_rejected() {
        let mut field = ConfigField::select("event", "Event", ["Issue Opened"], "Issue Opened");
        field.options = None;
        let mut graph = Graph::new();
        graph.add_node(NodeSpec::new("a", "noop").with_config(field));
        assert!(matches!(
            graph.validate(),
            Err(ValidationError::MissingSelectOptions { .. })
        ));
    }

    #[test]
    fn parses_editor_json() {
        let json = r#"{
            "nodes": [
                {"id": "1", "label": "Trigger: New Issue", "actionType": "github.issue_opened",
                 "position": {"x": 250, "y": 50},
                 "config": [{"key": "repo", "label": "Repository", "kind": "text", "value": "tambo/autoflow"}]},
                {"id": "2", "label": "Action: Summary", "actionType": "llm.summarize", "config": []}
            ],
            "edges": [{"id": "e1-2", "source": "1", "target": "2"}]
        }"#;
        let graph: Graph = serde_json::from_str(json).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].action_type, "github.issue_opened");
        assert_eq!(graph.nodes[0].position, Some(Position { x: 250.0, y: 50.0 }));
        assert_eq!(
            graph.nodes[0].config_value("repo").and_then(|v| v.as_str()),
            Some("tambo/autoflow")
        );
        assert_eq!(graph.edges[0].source, "1");
        assert_eq!(graph.validate(), Ok(()));

        let written = serde_json::to_value(&graph).unwrap();
        assert_eq!(written["nodes"][0]["actionType"], "github.issue_opened");
        assert!(written["nodes"][1].get("timeoutMs").is_none());
    }
}
