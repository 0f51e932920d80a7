use serde::Serialize;
use thiserror::Error;

use super::model::Graph;
use super::port::PortType;

/// An edge connecting ports that carry different kinds of value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "edge '{edge_id}': {source_node}.{source_port} produces {source_type} but \
     {target_node}.{target_port} expects {target_type}"
)]
pub struct TypeMismatch {
    pub edge_id: String,
    pub source_node: String,
    pub source_port: String,
    pub source_type: PortType,
    pub target_node: String,
    pub target_port: String,
    pub target_type: PortType,
}

/// Compare declared port types across every edge, collecting all mismatches
/// in edge order.
///
/// Edges with unknown endpoints or ports are skipped; structural validation
/// owns those.
pub fn check_types(graph: &Graph) -> Result<(), Vec<TypeMismatch>> {
    let mut mismatches = Vec::new();
    for edge in graph.edges() {
        let source = graph
            .node(&edge.source)
            .and_then(|n| n.kind().output(&edge.source_port));
        let target = graph
            .node(&edge.target)
            .and_then(|n| n.kind().input(&edge.target_port));
        let (Some(source), Some(target)) = (source, target) else {
            continue;
        };
        if source.ty != target.ty {
            mismatches.push(TypeMismatch {
                edge_id: edge.id.clone(),
                source_node: edge.source.clone(),
                source_port: edge.source_port.clone(),
                source_type: source.ty,
                target_node: edge.target.clone(),
                target_port: edge.target_port.clone(),
                target_type: target.ty,
            });
        }
    }
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::node::{KnowledgeBaseConfig, LlmConfig, Node, ResponseFormat};

    #[test]
    fn test_compatible_edges_pass() {
        let graph = Graph::from_parts(
            vec![
                Node::user_query("q1"),
                Node::llm_engine("l1", LlmConfig::default()),
                Node::output("o1", ResponseFormat::Markdown),
            ],
            vec![
                Edge::new("e1", "q1", "query", "l1", "query"),
                Edge::new("e2", "l1", "output", "o1", "output"),
            ],
        )
        .unwrap();
        assert_eq!(check_types(&graph), Ok(()));
    }

    #[test]
    fn test_all_mismatches_collected_in_edge_order() {
        let graph = Graph::from_parts(
            vec![
                Node::user_query("q1"),
                Node::knowledge_base("kb1", KnowledgeBaseConfig::default()),
                Node::llm_engine("l1", LlmConfig::default()),
                Node::output("o1", ResponseFormat::Text),
            ],
            vec![
                // Text into RetrievedContext.
                Edge::new("e1", "q1", "query", "l1", "context"),
                Edge::new("e2", "q1", "query", "kb1", "query"),
                // RetrievedContext into GeneratedText.
                Edge::new("e3", "kb1", "context", "o1", "output"),
            ],
        )
        .unwrap();

        let mismatches = check_types(&graph).unwrap_err();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].edge_id, "e1");
        assert_eq!(mismatches[0].source_type, PortType::Text);
        assert_eq!(mismatches[0].target_type, PortType::RetrievedContext);
        assert_eq!(mismatches[1].edge_id, "e3");
        assert!(mismatches[1]
            .to_string()
            .contains("kb1.context produces RetrievedContext"));
    }

    #[test]
    fn test_unknown_ports_skipped() {
        let graph = Graph::from_parts(
            vec![Node::user_query("q1"), Node::output("o1", ResponseFormat::Text)],
            vec![Edge::new("e1", "q1", "nope", "o1", "output")],
        )
        .unwrap();
        assert_eq!(check_types(&graph), Ok(()));
    }
}
