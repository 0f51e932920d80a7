//! Stored-workflow execution with chat transcript bookkeeping.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stackflow_core::error::{Result, StackError};
use stackflow_core::traits::{SessionStore, WorkflowStore};
use stackflow_core::types::{Capabilities, ChatMessage, SessionId};

use crate::failure::{FailureReason, NodeFailure};
use crate::graph::{DefinitionError, Graph, ValidationReport, WorkflowDefinition};
use crate::run::{Engine, RunResult};

/// Result of running a stored workflow inside a chat session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub session_id: SessionId,
    pub result: RunResult,
}

/// Authoring feedback for a workflow definition.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowValidation {
    /// Problems turning the definition into a graph. When non-empty the
    /// graph checks were not run.
    pub load_errors: Vec<DefinitionError>,
    pub report: ValidationReport,
}

impl WorkflowValidation {
    pub fn is_valid(&self) -> bool {
        self.load_errors.is_empty() && self.report.is_valid()
    }
}

pub struct StackService {
    workflows: Arc<dyn WorkflowStore>,
    sessions: Arc<dyn SessionStore>,
    engine: Engine,
    capabilities: Capabilities,
}

impl StackService {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        sessions: Arc<dyn SessionStore>,
        engine: Engine,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            workflows,
            sessions,
            engine,
            capabilities,
        }
    }

    pub async fn execute_workflow(
        &self,
        workflow_id: u64,
        query: &str,
        session: Option<SessionId>,
    ) -> Result<WorkflowRun> {
        self.execute_workflow_with_cancel(workflow_id, query, session, &CancellationToken::new())
            .await
    }

    /// Load, run, and record a stored workflow.
    ///
    /// Definition problems produce a failed run rather than an error; only
    /// store failures, unknown sessions, and unknown or inactive workflows
    /// are errors. Those are all raised before any node runs.
    pub async fn execute_workflow_with_cancel(
        &self,
        workflow_id: u64,
        query: &str,
        session: Option<SessionId>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowRun> {
        let record = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(StackError::WorkflowNotFound(workflow_id))?;
        if !record.is_active {
            return Err(StackError::WorkflowInactive(workflow_id));
        }

        let session_id = match session {
            Some(id) => {
                if !self.sessions.exists(&id).await? {
                    return Err(StackError::SessionNotFound(id.to_string()));
                }
                id
            }
            None => self.sessions.create(workflow_id).await?,
        };
        info!(workflow_id, workflow = %record.name, session = %session_id, "Executing workflow");

        let result = match load_graph(&record.definition) {
            Ok(graph) => {
                self.engine
                    .execute_with_cancel(&graph, query, &self.capabilities, cancel)
                    .await
            }
            Err(errors) => {
                warn!(workflow_id, errors = errors.len(), "Workflow definition rejected");
                RunResult::failed(
                    errors
                        .into_iter()
                        .map(|e| NodeFailure {
                            node_id: e.node_id().map(String::from),
                            reason: FailureReason::InvalidDefinition(e),
                        })
                        .collect(),
                )
            }
        };

        let reply = match result.output_text() {
            Some(text) => text.to_string(),
            None => failure_summary(&result),
        };
        self.sessions
            .append(
                &session_id,
                vec![ChatMessage::user(query), ChatMessage::assistant(reply)],
            )
            .await?;

        Ok(WorkflowRun { session_id, result })
    }

    /// Check a definition without running it.
    pub fn validate_workflow(&self, definition: &Value) -> WorkflowValidation {
        validate_definition(definition)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Parse a stored definition into a graph, collecting every load error.
pub fn load_graph(definition: &Value) -> std::result::Result<Graph, Vec<DefinitionError>> {
    WorkflowDefinition::from_value(definition)
        .map_err(|e| vec![e])?
        .to_graph()
}

pub fn validate_definition(definition: &Value) -> WorkflowValidation {
    match load_graph(definition) {
        Ok(graph) => WorkflowValidation {
            load_errors: Vec::new(),
            report: ValidationReport::for_graph(&graph),
        },
        Err(load_errors) => WorkflowValidation {
            load_errors,
            report: ValidationReport::default(),
        },
    }
}

fn failure_summary(result: &RunResult) -> String {
    if result.failures.is_empty() {
        return "The workflow produced no output.".to_string();
    }
    let reasons: Vec<String> = result.failures.iter().map(|f| f.to_string()).collect();
    format!("The workflow failed: {}", reasons.join("; "))
}
