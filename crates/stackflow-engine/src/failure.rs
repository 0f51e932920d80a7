use serde::Serialize;
use thiserror::Error;

use stackflow_core::error::CapabilityError;

use crate::graph::{DefinitionError, StructuralError, TypeMismatch};

/// Why a node, or the run as a whole, failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The graph failed structural validation.
    #[error("{0}")]
    Structural(StructuralError),

    /// An edge connects incompatible port types.
    #[error("{0}")]
    TypeMismatch(TypeMismatch),

    /// The stored definition could not be turned into a graph.
    #[error("{0}")]
    InvalidDefinition(DefinitionError),

    /// An external capability errored or timed out.
    #[error("{0}")]
    Capability(CapabilityError),

    #[error("run was invoked without a query")]
    MissingQuery,

    #[error("required input '{port}' is not connected")]
    MissingInput { port: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CapabilityError> for FailureReason {
    fn from(e: CapabilityError) -> Self {
        FailureReason::Capability(e)
    }
}

/// A failure attributed to a node, or to the run when `node_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node_id: Option<String>,
    pub reason: FailureReason,
}

impl NodeFailure {
    pub fn node(node_id: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            node_id: Some(node_id.into()),
            reason,
        }
    }

    pub fn run(reason: FailureReason) -> Self {
        Self {
            node_id: None,
            reason,
        }
    }
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "{}: {}", id, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}
