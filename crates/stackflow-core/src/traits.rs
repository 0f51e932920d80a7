use futures::future::BoxFuture;

use crate::error::{CapabilityResult, Result};
use crate::types::*;

/// Document retrieval over the knowledge base (embedding + vector search).
pub trait Retriever: Send + Sync + 'static {
    /// Return passages relevant to the query, best first.
    ///
    /// Implementations should honor `max_results` and `threshold`, but the
    /// knowledge base executor re-applies both.
    fn retrieve(&self, request: RetrievalRequest) -> BoxFuture<'_, CapabilityResult<Vec<Passage>>>;
}

/// Text generation against an LLM provider.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, CapabilityResult<String>>;
}

/// Web search provider.
pub trait WebSearch: Send + Sync + 'static {
    fn search(&self, query: String) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>>;
}

/// Workflow definition storage keyed by numeric id.
pub trait WorkflowStore: Send + Sync + 'static {
    /// Load a workflow. `Ok(None)` when the id is unknown.
    fn get(&self, id: u64) -> BoxFuture<'_, Result<Option<WorkflowRecord>>>;

    /// Insert or replace a workflow.
    fn put(&self, record: WorkflowRecord) -> BoxFuture<'_, Result<()>>;
}

/// Chat session transcript storage.
pub trait SessionStore: Send + Sync + 'static {
    /// Open a new session bound to a workflow.
    fn create(&self, workflow_id: u64) -> BoxFuture<'_, Result<SessionId>>;

    /// Whether a session with this id was created.
    fn exists(&self, session: &SessionId) -> BoxFuture<'_, Result<bool>>;

    /// Append messages to an existing session.
    fn append(&self, session: &SessionId, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<()>>;

    /// Load the most recent `limit` messages, oldest first.
    fn history(&self, session: &SessionId, limit: usize) -> BoxFuture<'_, Result<Vec<ChatMessage>>>;
}
