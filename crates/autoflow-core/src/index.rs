//! Adjacency index over a [`Graph`], built once per run.

use crate::{CycleDetected, Graph, NodeId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Default)]
struct Adjacency {
    predecessors: BTreeSet<NodeId>,
    successors: BTreeSet<NodeId>,
}

/// Predecessor/successor lookups for every node of a graph.
///
/// Expects a graph that passed [`Graph::validate`]; edges naming unknown
/// nodes are ignored.
pub struct GraphIndex {
    graph: DiGraph<NodeId, ()>,
    adjacency: HashMap<NodeId, Adjacency>,
    /// Node ids in declaration order.
    order: Vec<NodeId>,
}

impl GraphIndex {
    pub fn build(workflow: &Graph) -> Self {
        let mut graph = DiGraph::with_capacity(workflow.nodes.len(), workflow.edges.len());
        let mut node_to_index: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(workflow.nodes.len());
        let mut adjacency: HashMap<NodeId, Adjacency> = HashMap::with_capacity(workflow.nodes.len());
        let mut order = Vec::with_capacity(workflow.nodes.len());

        for node in &workflow.nodes {
            if node_to_index.contains_key(&node.id) {
                continue;
            }
            let idx = graph.add_node(node.id.clone());
            node_to_index.insert(node.id.clone(), idx);
            adjacency.insert(node.id.clone(), Adjacency::default());
            order.push(node.id.clone());
        }

        for edge in &workflow.edges {
            let (Some(&from), Some(&to)) = (
                node_to_index.get(&edge.source),
                node_to_index.get(&edge.target),
            ) else {
                continue;
            };
            // Parallel edges collapse into one dependency.
            if graph.find_edge(from, to).is_none() {
                graph.add_edge(from, to, ());
            }
            if let Some(adj) = adjacency.get_mut(&edge.source) {
                adj.successors.insert(edge.target.clone());
            }
            if let Some(adj) = adjacency.get_mut(&edge.target) {
                adj.predecessors.insert(edge.source.clone());
            }
        }

        Self {
            graph,
            adjacency,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node ids in the order they were declared.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.order.iter()
    }

    /// Direct predecessors of `id`, ascending. Empty for unknown ids.
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.adjacency
            .get(id)
            .into_iter()
            .flat_map(|adj| adj.predecessors.iter())
    }

    /// Direct successors of `id`, ascending. Empty for unknown ids.
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.adjacency
            .get(id)
            .into_iter()
            .flat_map(|adj| adj.successors.iter())
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.adjacency
            .get(id)
            .map(|adj| adj.predecessors.len())
            .unwrap_or(0)
    }

    /// Nodes without incoming edges, ascending.
    pub fn roots(&self) -> BTreeSet<NodeId> {
        self.adjacency
            .iter()
            .filter(|(_, adj)| adj.predecessors.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Kahn's algorithm over the whole edge set.
    ///
    /// Ties are broken by ascending node id so the order is stable. When some
    /// nodes can never reach in-degree zero the error names the nodes that sit
    /// on a cycle, not the ones merely downstream of it.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleDetected> {
        let mut in_degree: HashMap<&str, usize> = self
            .adjacency
            .iter()
            .map(|(id, adj)| (id.as_str(), adj.predecessors.len()))
            .collect();

        let mut queue: VecDeque<&NodeId> = self
            .adjacency
            .iter()
            .filter(|(_, adj)| adj.predecessors.is_empty())
            .map(|(id, _)| id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some(id) = queue.pop_front() {
            sorted.push(id.clone());
            for next in self.successors(id) {
                if let Some(degree) = in_degree.get_mut(next.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if sorted.len() == self.order.len() {
            return Ok(sorted);
        }

        let mut nodes: Vec<NodeId> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.contains_edge(idx, idx))
            })
            .flatten()
            .map(|idx| self.graph[idx].clone())
            .collect();
        nodes.sort();

        tracing::debug!(cyclic = ?nodes, "Topological sort left {} node(s) unresolved", self.order.len() - sorted.len());
        Err(CycleDetected { nodes })
    }
}
