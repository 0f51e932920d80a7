//! Workflow execution engine for stack-builder graphs.
//!
//! `graph` holds the typed model and its validation gates, `executor` the
//! per-kind node strategies, `run` the orchestrator, and `service` the
//! stored-workflow entry point used by the chat surface.

pub mod executor;
pub mod failure;
pub mod graph;
pub mod retry;
pub mod run;
pub mod service;

pub use executor::{ExecutorRegistry, NodeExecutor};
pub use failure::{FailureReason, NodeFailure};
pub use graph::{Graph, ValidationReport, WorkflowDefinition};
pub use retry::{with_retries, RetryingGenerator};
pub use run::{execute, Engine, RunPhase, RunResult, RunStatus};
pub use service::{load_graph, validate_definition, StackService, WorkflowRun, WorkflowValidation};
