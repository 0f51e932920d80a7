use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::model::Graph;
use super::node::NodeKind;
use super::port::PortDirection;
use super::schedule::schedule;
use super::typecheck::{check_types, TypeMismatch};

/// A graph that cannot be executed as authored.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralError {
    #[error("duplicate node id '{node_id}'")]
    DuplicateNode { node_id: String },

    #[error("edge '{edge_id}' references missing node '{node_id}'")]
    DanglingEndpoint { edge_id: String, node_id: String },

    #[error("edge '{edge_id}': node '{node_id}' ({node_kind}) has no {direction} port '{port}'")]
    UnknownPort {
        edge_id: String,
        node_id: String,
        node_kind: NodeKind,
        direction: PortDirection,
        port: String,
    },

    #[error("input '{node_id}.{port}' has multiple writers: {}", edges.join(", "))]
    MultipleWriters {
        node_id: String,
        port: String,
        edges: Vec<String>,
    },

    #[error("cycle detected among nodes: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },

    #[error("no output node is reachable from a user query node")]
    NoReachableOutput,
}

impl StructuralError {
    /// The node most directly responsible, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            StructuralError::DuplicateNode { node_id }
            | StructuralError::DanglingEndpoint { node_id, .. }
            | StructuralError::UnknownPort { node_id, .. }
            | StructuralError::MultipleWriters { node_id, .. } => Some(node_id),
            StructuralError::Cycle { nodes } => nodes.first().map(String::as_str),
            StructuralError::NoReachableOutput => None,
        }
    }
}

/// Check that a graph is executable, reporting the first violation.
///
/// Checks run in a fixed order: endpoints, fan-in, cycles, reachability.
pub fn validate_structure(graph: &Graph) -> Result<(), StructuralError> {
    check_endpoints(graph)?;
    check_fan_in(graph)?;
    schedule(graph).map_err(|e| StructuralError::Cycle { nodes: e.nodes })?;
    check_reachability(graph)
}

fn check_endpoints(graph: &Graph) -> Result<(), StructuralError> {
    for edge in graph.edges() {
        let ends = [
            (&edge.source, &edge.source_port, PortDirection::Output),
            (&edge.target, &edge.target_port, PortDirection::Input),
        ];
        for (node_id, port, direction) in ends {
            let Some(node) = graph.node(node_id) else {
                return Err(StructuralError::DanglingEndpoint {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                });
            };
            if node.kind().port(direction, port).is_none() {
                return Err(StructuralError::UnknownPort {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    node_kind: node.kind(),
                    direction,
                    port: port.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_fan_in(graph: &Graph) -> Result<(), StructuralError> {
    let mut writers: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        writers
            .entry((edge.target.as_str(), edge.target_port.as_str()))
            .or_default()
            .push(edge.id.as_str());
    }
    // Report in edge order: the first input that picked up a second writer.
    for edge in graph.edges() {
        let key = (edge.target.as_str(), edge.target_port.as_str());
        if let Some(edges) = writers.get(&key).filter(|w| w.len() > 1) {
            return Err(StructuralError::MultipleWriters {
                node_id: edge.target.clone(),
                port: edge.target_port.clone(),
                edges: edges.iter().map(|e| e.to_string()).collect(),
            });
        }
    }
    Ok(())
}

fn check_reachability(graph: &Graph) -> Result<(), StructuralError> {
    let reached = graph.reachable_from_kind(NodeKind::UserQuery);
    let found = graph
        .nodes_of_kind(NodeKind::Output)
        .any(|n| reached.contains(&n.id));
    if found {
        Ok(())
    } else {
        Err(StructuralError::NoReachableOutput)
    }
}

/// Everything wrong with a graph, for authoring feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// First structural violation, if any.
    pub structural: Option<StructuralError>,
    /// Every incompatible edge.
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ValidationReport {
    /// Run both validation gates against `graph`.
    pub fn for_graph(graph: &Graph) -> Self {
        Self {
            structural: validate_structure(graph).err(),
            type_mismatches: check_types(graph).err().unwrap_or_default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.structural.is_none() && self.type_mismatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::node::{KnowledgeBaseConfig, LlmConfig, Node, ResponseFormat};

    fn nodes() -> Vec<Node> {
        vec![
            Node::user_query("q1"),
            Node::knowledge_base("kb1", KnowledgeBaseConfig::default()),
            Node::llm_engine("l1", LlmConfig::default()),
            Node::output("o1", ResponseFormat::Text),
        ]
    }

    fn chain() -> Vec<Edge> {
        vec![
            Edge::new("e1", "q1", "query", "kb1", "query"),
            Edge::new("e2", "kb1", "context", "l1", "context"),
            Edge::new("e3", "l1", "output", "o1", "output"),
        ]
    }

    #[test]
    fn test_valid_chain_passes() {
        let graph = Graph::from_parts(nodes(), chain()).unwrap();
        assert_eq!(validate_structure(&graph), Ok(()));
        assert!(ValidationReport::for_graph(&graph).is_valid());
    }

    #[test]
    fn test_dangling_endpoint() {
        let mut edges = chain();
        edges.push(Edge::new("e4", "l1", "output", "missing", "output"));
        let graph = Graph::from_parts(nodes(), edges).unwrap();
        assert_eq!(
            validate_structure(&graph),
            Err(StructuralError::DanglingEndpoint {
                edge_id: "e4".into(),
                node_id: "missing".into()
            })
        );
    }

    #[test]
    fn test_port_direction_is_checked() {
        // `context` is an output of the knowledge base, not an input.
        let mut edges = chain();
        edges[0] = Edge::new("e1", "q1", "query", "kb1", "context");
        let graph = Graph::from_parts(nodes(), edges).unwrap();
        let err = validate_structure(&graph).unwrap_err();
        assert!(matches!(
            err,
            StructuralError::UnknownPort {
                direction: PortDirection::Input,
                ref port,
                ..
            } if port == "context"
        ));
        assert_eq!(err.node_id(), Some("kb1"));
    }

    #[test]
    fn test_fan_in_reported_before_cycle() {
        // Both a second writer into l1.context and a cycle l1 -> l2 -> l1.
        let mut all = nodes();
        all.push(Node::llm_engine("l2", LlmConfig::default()));
        let mut edges = chain();
        edges.push(Edge::new("e4", "l1", "output", "l2", "context"));
        edges.push(Edge::new("e5", "l2", "output", "l1", "context"));
        let graph = Graph::from_parts(all, edges).unwrap();

        assert_eq!(
            validate_structure(&graph),
            Err(StructuralError::MultipleWriters {
                node_id: "l1".into(),
                port: "context".into(),
                edges: vec!["e2".into(), "e5".into()],
            })
        );
    }

    #[test]
    fn test_cycle_detected() {
        let mut all = nodes();
        all.push(Node::llm_engine("l2", LlmConfig::default()));
        let edges = vec![
            Edge::new("e1", "q1", "query", "l1", "query"),
            Edge::new("e2", "l1", "output", "l2", "context"),
            Edge::new("e3", "l2", "output", "l1", "context"),
            Edge::new("e4", "l2", "output", "o1", "output"),
        ];
        let graph = Graph::from_parts(all, edges).unwrap();
        assert_eq!(
            validate_structure(&graph),
            Err(StructuralError::Cycle {
                nodes: vec!["l1".into(), "l2".into(), "o1".into()]
            })
        );
    }

    #[test]
    fn test_unreachable_output() {
        // Output is fed by an LLM node that nothing upstream reaches.
        let graph = Graph::from_parts(
            nodes(),
            vec![
                Edge::new("e1", "q1", "query", "kb1", "query"),
                Edge::new("e3", "l1", "output", "o1", "output"),
            ],
        )
        .unwrap();
        assert_eq!(
            validate_structure(&graph),
            Err(StructuralError::NoReachableOutput)
        );
    }

    #[test]
    fn test_missing_output_node() {
        let graph = Graph::from_parts(
            vec![Node::user_query("q1"), Node::llm_engine("l1", LlmConfig::default())],
            vec![Edge::new("e1", "q1", "query", "l1", "query")],
        )
        .unwrap();
        assert_eq!(
            validate_structure(&graph),
            Err(StructuralError::NoReachableOutput)
        );
    }

    #[test]
    fn test_report_collects_both_gates() {
        // q1.query -> o1.output is structurally fine but Text != GeneratedText.
        let graph = Graph::from_parts(
            vec![Node::user_query("q1"), Node::output("o1", ResponseFormat::Text)],
            vec![Edge::new("e1", "q1", "query", "o1", "output")],
        )
        .unwrap();
        let report = ValidationReport::for_graph(&graph);
        assert!(report.structural.is_none());
        assert_eq!(report.type_mismatches.len(), 1);
        assert!(!report.is_valid());
    }
}
