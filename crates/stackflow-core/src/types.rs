use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::{Generator, Retriever, WebSearch};

/// Unique chat session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one engine run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ranked text passage returned by the retrieval capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub passage_id: String,
    pub text: String,
    pub similarity: f64,
}

impl Passage {
    pub fn new(passage_id: impl Into<String>, text: impl Into<String>, similarity: f64) -> Self {
        Self {
            passage_id: passage_id.into(),
            text: text.into(),
            similarity,
        }
    }
}

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}

/// Arguments for a retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub max_results: usize,
    pub threshold: f64,
}

/// Arguments for a text generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// The external capabilities a run may call into.
///
/// Cheap to clone; every handle is shared.
#[derive(Clone)]
pub struct Capabilities {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub web_search: Arc<dyn WebSearch>,
}

impl Capabilities {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        web_search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            retriever,
            generator,
            web_search,
        }
    }

    /// Replace the generator, keeping the other capabilities.
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }
}

/// A stored workflow definition plus the metadata the UI keeps with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Raw definition as authored in the builder (`nodes` + `edges`).
    pub definition: serde_json::Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// One message in a chat session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub is_user: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle events published while a run executes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run accepted; validation about to begin.
    RunStarted { run_id: RunId },
    /// Validation passed and an execution order was produced.
    RunScheduled { run_id: RunId, order: Vec<String> },
    /// A node's executor was invoked.
    NodeStarted { run_id: RunId, node_id: String },
    /// A node produced its outputs.
    NodeCompleted {
        run_id: RunId,
        node_id: String,
        elapsed_ms: u64,
    },
    /// A node failed; the reason is rendered for display.
    NodeFailed {
        run_id: RunId,
        node_id: String,
        reason: String,
    },
    /// A node was not run because an upstream producer failed.
    NodeSkipped { run_id: RunId, node_id: String },
    /// Run finished.
    RunFinished {
        run_id: RunId,
        succeeded: bool,
        elapsed_ms: u64,
    },
}
