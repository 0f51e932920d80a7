//! Node executors: one strategy per node kind.
//!
//! An executor is a function of (node configuration, resolved inputs,
//! external capabilities) to one value per declared output port. The
//! orchestrator selects executors through `ExecutorRegistry`, a table keyed
//! on `NodeKind`.

pub mod context;
pub mod generation;
pub mod output;
pub mod query;
pub mod retrieval;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use stackflow_core::config::EngineConfig;
use stackflow_core::error::{CapabilityError, CapabilityResult};
use stackflow_core::types::{Capabilities, Passage};

use crate::failure::FailureReason;
use crate::graph::{Node, NodeKind, PortValue};

pub use context::ExecutionContext;
pub use generation::LlmExecutor;
pub use output::OutputExecutor;
pub use query::QueryExecutor;
pub use retrieval::KnowledgeBaseExecutor;

/// Values an executor produced, one per output port.
pub type NodeOutputs = Vec<(&'static str, PortValue)>;

pub type NodeOutcome = Result<NodeOutputs, FailureReason>;

/// Upstream values for a node's connected input ports.
#[derive(Debug, Default)]
pub struct NodeInputs<'a> {
    values: Vec<(&'static str, &'a PortValue)>,
}

impl<'a> NodeInputs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: &'static str, value: &'a PortValue) {
        self.values.push((port, value));
    }

    pub fn get(&self, port: &str) -> Option<&'a PortValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == port)
            .map(|(_, v)| *v)
    }

    pub fn text(&self, port: &str) -> Option<&'a str> {
        match self.get(port)? {
            PortValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn passages(&self, port: &str) -> Option<&'a [Passage]> {
        match self.get(port)? {
            PortValue::RetrievedContext(p) => Some(p),
            _ => None,
        }
    }

    pub fn generated(&self, port: &str) -> Option<&'a str> {
        match self.get(port)? {
            PortValue::GeneratedText(s) => Some(s),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything about the run that executors may consult.
pub struct ExecutionEnv<'a> {
    /// The query the run was invoked with.
    pub query: &'a str,
    pub capabilities: &'a Capabilities,
    pub config: &'a EngineConfig,
    pub cancel: &'a CancellationToken,
}

impl ExecutionEnv<'_> {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.node_timeout_secs)
    }

    /// Await a capability call under the node timeout, abandoning it if the
    /// run is cancelled first.
    pub async fn call<T, F>(&self, call: F, on_timeout: CapabilityError) -> Result<T, FailureReason>
    where
        F: Future<Output = CapabilityResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FailureReason::Cancelled),
            result = tokio::time::timeout(self.timeout(), call) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(FailureReason::Capability(e)),
                Err(_) => Err(FailureReason::Capability(on_timeout)),
            },
        }
    }
}

/// Strategy for executing one node kind.
pub trait NodeExecutor: Send + Sync + 'static {
    fn execute<'a>(
        &'a self,
        node: &'a Node,
        inputs: NodeInputs<'a>,
        env: &'a ExecutionEnv<'a>,
    ) -> BoxFuture<'a, NodeOutcome>;
}

/// Lookup table from node kind to executor.
pub struct ExecutorRegistry {
    table: HashMap<NodeKind, Box<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The built-in executor for every node kind.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(NodeKind::UserQuery, QueryExecutor);
        registry.register(NodeKind::KnowledgeBase, KnowledgeBaseExecutor);
        registry.register(NodeKind::LlmEngine, LlmExecutor);
        registry.register(NodeKind::Output, OutputExecutor);
        registry
    }

    pub fn register(&mut self, kind: NodeKind, executor: impl NodeExecutor) {
        self.table.insert(kind, Box::new(executor));
    }

    pub fn get(&self, kind: NodeKind) -> Option<&dyn NodeExecutor> {
        self.table.get(&kind).map(|e| e.as_ref())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Failure for an executor handed a node of the wrong kind.
pub(crate) fn kind_mismatch(node: &Node, expected: NodeKind) -> FailureReason {
    FailureReason::Internal(format!(
        "{} executor received node '{}' of kind {}",
        expected,
        node.id,
        node.kind()
    ))
}


#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::types::RetrievalRequest;
    use stackflow_test_utils::{MockGenerator, MockRetriever, MockWebSearch};
    use testing::EnvParts;

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = ExecutorRegistry::standard();
        for kind in NodeKind::ALL {
            assert!(registry.get(kind).is_some(), "{kind}");
        }
        assert!(ExecutorRegistry::empty().get(NodeKind::Output).is_none());
    }

    #[test]
    fn test_inputs_typed_accessors() {
        let text = PortValue::Text("hi".into());
        let ctx = PortValue::RetrievedContext(vec![]);
        let mut inputs = NodeInputs::new();
        inputs.insert("query", &text);
        inputs.insert("context", &ctx);

        assert_eq!(inputs.text("query"), Some("hi"));
        assert!(inputs.passages("context").unwrap().is_empty());
        // Wrong variant for the accessor.
        assert_eq!(inputs.generated("query"), None);
        assert_eq!(inputs.len(), 2);
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let mut parts = EnvParts::new(
            MockRetriever::default().with_delay(Duration::from_secs(5)),
            MockGenerator::replying("ok"),
            MockWebSearch::default(),
        );
        parts.config.node_timeout_secs = 1;
        let env = parts.env("q");

        let call = env.capabilities.retriever.retrieve(RetrievalRequest {
            query: "q".into(),
            max_results: 5,
            threshold: 0.5,
        });
        let err = env
            .call(call, CapabilityError::RetrievalUnavailable("timed out".into()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FailureReason::Capability(CapabilityError::RetrievalUnavailable("timed out".into()))
        );
    }

    #[tokio::test]
    async fn test_call_observes_cancellation() {
        let parts = EnvParts::new(
            MockRetriever::default().with_delay(Duration::from_secs(60)),
            MockGenerator::replying("ok"),
            MockWebSearch::default(),
        );
        parts.cancel.cancel();
        let env = parts.env("q");

        let call = env.capabilities.retriever.retrieve(RetrievalRequest {
            query: "q".into(),
            max_results: 5,
            threshold: 0.5,
        });
        let err = env
            .call(call, CapabilityError::RetrievalUnavailable("timed out".into()))
            .await
            .unwrap_err();
        assert_eq!(err, FailureReason::Cancelled);
    }

    #[tokio::test]
    async fn test_default_parts_build_env() {
        let parts = EnvParts::default();
        let env = parts.env("What is X?");
        assert_eq!(env.query, "What is X?");
        assert_eq!(env.timeout(), Duration::from_secs(60));
    }
}
