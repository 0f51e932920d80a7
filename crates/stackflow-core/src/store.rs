//! In-memory workflow and session stores.
//!
//! Used by the CLI and tests; production deployments plug in their own
//! `WorkflowStore` / `SessionStore` backed by a database.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::error::{Result, StackError};
use crate::traits::{SessionStore, WorkflowStore};
use crate::types::{ChatMessage, SessionId, WorkflowRecord};

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<u64, WorkflowRecord>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn get(&self, id: u64) -> BoxFuture<'_, Result<Option<WorkflowRecord>>> {
        Box::pin(async move { Ok(self.workflows.read().await.get(&id).cloned()) })
    }

    fn put(&self, record: WorkflowRecord) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.workflows.write().await.insert(record.id, record);
            Ok(())
        })
    }
}

struct SessionLog {
    workflow_id: u64,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionLog>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workflow a session was opened for.
    pub async fn workflow_of(&self, session: &SessionId) -> Option<u64> {
        self.sessions
            .read()
            .await
            .get(session)
            .map(|log| log.workflow_id)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, workflow_id: u64) -> BoxFuture<'_, Result<SessionId>> {
        Box::pin(async move {
            let id = SessionId::new();
            self.sessions.write().await.insert(
                id.clone(),
                SessionLog {
                    workflow_id,
                    messages: Vec::new(),
                },
            );
            Ok(id)
        })
    }

    fn exists(&self, session: &SessionId) -> BoxFuture<'_, Result<bool>> {
        let session = session.clone();
        Box::pin(async move { Ok(self.sessions.read().await.contains_key(&session)) })
    }

    fn append(&self, session: &SessionId, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<()>> {
        let session = session.clone();
        Box::pin(async move {
            let mut sessions = self.sessions.write().await;
            let log = sessions
                .get_mut(&session)
                .ok_or_else(|| StackError::SessionNotFound(session.to_string()))?;
            log.messages.extend(messages);
            Ok(())
        })
    }

    fn history(&self, session: &SessionId, limit: usize) -> BoxFuture<'_, Result<Vec<ChatMessage>>> {
        let session = session.clone();
        Box::pin(async move {
            let sessions = self.sessions.read().await;
            let log = sessions
                .get(&session)
                .ok_or_else(|| StackError::SessionNotFound(session.to_string()))?;
            let skip = log.messages.len().saturating_sub(limit);
            Ok(log.messages[skip..].to_vec())
        })
    }
}
