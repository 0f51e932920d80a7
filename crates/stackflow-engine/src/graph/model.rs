use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::edge::Edge;
use super::node::{Node, NodeKind};
use super::validate::StructuralError;

/// A workflow graph: nodes keyed by id plus an ordered edge list.
///
/// Node iteration order is by id, which keeps every derived ordering
/// (scheduling, validation reports) deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph, rejecting duplicate node ids.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, StructuralError> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge in edges {
            graph.add_edge(edge);
        }
        Ok(graph)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), StructuralError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StructuralError::DuplicateNode { node_id: node.id });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Edges are not checked here; `validate_structure` reports bad endpoints.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// The single edge feeding `port` on `id`, if any.
    pub fn input_edge(&self, id: &str, port: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == id && e.target_port == port)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.kind() == kind)
    }

    /// Every node reachable by following edges forward from any node of
    /// `kind` (the start nodes included).
    pub fn reachable_from_kind(&self, kind: NodeKind) -> BTreeSet<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for node in self.nodes_of_kind(kind) {
            if seen.insert(node.id.clone()) {
                queue.push_back(&node.id);
            }
        }
        while let Some(id) = queue.pop_front() {
            for edge in self.outgoing(id) {
                if self.nodes.contains_key(&edge.target) && seen.insert(edge.target.clone()) {
                    queue.push_back(&edge.target);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{KnowledgeBaseConfig, LlmConfig, ResponseFormat};

    #[test]
    fn test_duplicate_node_rejected() {
        let err = Graph::from_parts(vec![Node::user_query("q1"), Node::user_query("q1")], vec![])
            .unwrap_err();
        assert_eq!(
            err,
            StructuralError::DuplicateNode {
                node_id: "q1".into()
            }
        );
    }

    #[test]
    fn test_lookup_helpers() {
        let graph = Graph::from_parts(
            vec![
                Node::user_query("q1"),
                Node::knowledge_base("kb1", KnowledgeBaseConfig::default()),
                Node::llm_engine("l1", LlmConfig::default()),
                Node::output("o1", ResponseFormat::Text),
            ],
            vec![
                Edge::new("e1", "q1", "query", "kb1", "query"),
                Edge::new("e2", "q1", "query", "l1", "query"),
                Edge::new("e3", "kb1", "context", "l1", "context"),
                Edge::new("e4", "l1", "output", "o1", "output"),
            ],
        )
        .unwrap();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.outgoing("q1").count(), 2);
        assert_eq!(graph.incoming("l1").count(), 2);
        assert_eq!(graph.input_edge("l1", "context").unwrap().id, "e3");
        assert!(graph.input_edge("kb1", "context").is_none());

        let ids: Vec<&str> = graph.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["kb1", "l1", "o1", "q1"]);
    }

    #[test]
    fn test_reachability_ignores_dangling_targets() {
        let graph = Graph::from_parts(
            vec![Node::user_query("q1"), Node::output("o1", ResponseFormat::Text)],
            vec![Edge::new("e1", "q1", "query", "ghost", "query")],
        )
        .unwrap();

        let reached = graph.reachable_from_kind(NodeKind::UserQuery);
        assert_eq!(reached.into_iter().collect::<Vec<_>>(), vec!["q1".to_string()]);
    }
}
