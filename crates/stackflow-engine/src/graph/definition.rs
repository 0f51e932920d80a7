//! Loading workflow definitions as authored in the stack builder.
//!
//! The builder stores `nodes` with a `type` tag and a loose `configuration`
//! bag (directly or under `data.configuration`), and `edges` using the
//! `source` / `sourceHandle` / `target` / `targetHandle` naming. Handles are
//! optional; when missing they are inferred from the port tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::edge::Edge;
use super::model::Graph;
use super::node::{ConfigError, Node, NodeConfig, NodeKind};
use super::port::PortType;
use super::validate::StructuralError;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefinitionError {
    #[error("malformed workflow definition: {message}")]
    Malformed { message: String },

    #[error("node '{node_id}' has unknown type '{kind}'")]
    UnknownKind { node_id: String, kind: String },

    #[error("{error}")]
    Structural { error: StructuralError },

    #[error("{error}")]
    Config { error: ConfigError },

    #[error("edge '{edge_id}': cannot infer a port on '{node_id}': {reason}")]
    UnresolvedPort {
        edge_id: String,
        node_id: String,
        reason: String,
    },
}

impl DefinitionError {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            DefinitionError::Malformed { .. } => None,
            DefinitionError::UnknownKind { node_id, .. }
            | DefinitionError::UnresolvedPort { node_id, .. } => Some(node_id),
            DefinitionError::Structural { error } => error.node_id(),
            DefinitionError::Config { error } => Some(&error.node_id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub configuration: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub configuration: Option<Map<String, Value>>,
    #[serde(default)]
    pub data: Option<NodeData>,
}

impl NodeDefinition {
    /// Top-level `configuration` wins over `data.configuration`.
    fn options(&self) -> Map<String, Value> {
        self.configuration
            .clone()
            .or_else(|| self.data.as_ref().map(|d| d.configuration.clone()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
}

/// A workflow as stored by the builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

impl WorkflowDefinition {
    pub fn from_value(value: &Value) -> Result<Self, DefinitionError> {
        serde_json::from_value(value.clone()).map_err(|e| DefinitionError::Malformed {
            message: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(text).map_err(|e| DefinitionError::Malformed {
            message: e.to_string(),
        })
    }

    /// Convert into a typed graph, collecting every load error.
    ///
    /// Structural problems other than duplicate ids (dangling edges, fan-in,
    /// cycles) are left for `validate_structure`.
    pub fn to_graph(&self) -> Result<Graph, Vec<DefinitionError>> {
        let mut errors = Vec::new();
        let mut graph = Graph::new();

        for def in &self.nodes {
            let Some(kind) = NodeKind::from_tag(&def.kind) else {
                errors.push(DefinitionError::UnknownKind {
                    node_id: def.id.clone(),
                    kind: def.kind.clone(),
                });
                continue;
            };
            match NodeConfig::from_options(&def.id, kind, &def.options()) {
                Ok(config) => {
                    if let Err(error) = graph.add_node(Node::new(def.id.clone(), config)) {
                        errors.push(DefinitionError::Structural { error });
                    }
                }
                Err(error) => errors.push(DefinitionError::Config { error }),
            }
        }

        // Edge handles are only resolvable once every node kind is known.
        if !errors.is_empty() {
            return Err(errors);
        }

        for (index, def) in self.edges.iter().enumerate() {
            let id = def.id.clone().unwrap_or_else(|| format!("e{}", index + 1));
            let source_port = match &def.source_handle {
                Some(handle) => handle.clone(),
                None => infer_source_port(&graph, &def.source),
            };
            let target_port = match &def.target_handle {
                Some(handle) => Ok(handle.clone()),
                None => infer_target_port(&graph, &id, &def.source, &source_port, &def.target),
            };
            match target_port {
                Ok(target_port) => graph.add_edge(Edge::new(
                    id,
                    def.source.clone(),
                    source_port,
                    def.target.clone(),
                    target_port,
                )),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(errors)
        }
    }
}

/// Every kind declares exactly one output, so the source side is unambiguous.
/// Unknown sources keep an empty port and fail structural validation.
fn infer_source_port(graph: &Graph, source: &str) -> String {
    graph
        .node(source)
        .and_then(|n| n.kind().outputs().first())
        .map(|p| p.name.to_string())
        .unwrap_or_default()
}

/// Pick the target input whose type matches the source output; fall back to
/// the sole input so the type checker can report the mismatch.
fn infer_target_port(
    graph: &Graph,
    edge_id: &str,
    source: &str,
    source_port: &str,
    target: &str,
) -> Result<String, DefinitionError> {
    let Some(target_node) = graph.node(target) else {
        // Dangling; structural validation reports it with the edge id.
        return Ok(String::new());
    };
    let inputs = target_node.kind().inputs();
    let source_type: Option<PortType> = graph
        .node(source)
        .and_then(|n| n.kind().output(source_port))
        .map(|p| p.ty);

    let matching: Vec<_> = inputs
        .iter()
        .filter(|p| Some(p.ty) == source_type)
        .collect();
    match (matching.as_slice(), inputs) {
        ([only], _) => Ok(only.name.to_string()),
        (_, [only]) => Ok(only.name.to_string()),
        (_, []) => Err(DefinitionError::UnresolvedPort {
            edge_id: edge_id.to_string(),
            node_id: target.to_string(),
            reason: format!("{} nodes accept no inputs", target_node.kind()),
        }),
        _ => Err(DefinitionError::UnresolvedPort {
            edge_id: edge_id.to_string(),
            node_id: target.to_string(),
            reason: "several inputs could accept this edge; set targetHandle".into(),
        }),
    }
}
