use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    // Workflow store errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(u64),

    #[error("Workflow is inactive: {0}")]
    WorkflowInactive(u64),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;

/// Failure reported by an external capability (retrieval, generation, search).
///
/// These are local to the node that made the call: the orchestrator records
/// them against the node and decides whether the run can still succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CapabilityError {
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("generation timed out")]
    GenerationTimeout,

    #[error("web search unavailable: {0}")]
    SearchUnavailable(String),
}

impl CapabilityError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::GenerationUnavailable(_) | CapabilityError::GenerationTimeout
        )
    }
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
