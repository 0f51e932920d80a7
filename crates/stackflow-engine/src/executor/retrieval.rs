use std::cmp::Ordering;

use futures::future::BoxFuture;
use tracing::debug;

use stackflow_core::error::CapabilityError;
use stackflow_core::types::{Passage, RetrievalRequest};

use crate::failure::FailureReason;
use crate::graph::{port, Node, NodeConfig, NodeKind, PortValue};

use super::{kind_mismatch, ExecutionEnv, NodeExecutor, NodeInputs, NodeOutcome};

/// Looks up passages relevant to the incoming query.
pub struct KnowledgeBaseExecutor;

impl NodeExecutor for KnowledgeBaseExecutor {
    fn execute<'a>(
        &'a self,
        node: &'a Node,
        inputs: NodeInputs<'a>,
        env: &'a ExecutionEnv<'a>,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(async move {
            let NodeConfig::KnowledgeBase(config) = &node.config else {
                return Err(kind_mismatch(node, NodeKind::KnowledgeBase));
            };
            let query = inputs.text(port::QUERY).ok_or_else(|| FailureReason::MissingInput {
                port: port::QUERY.to_string(),
            })?;

            let request = RetrievalRequest {
                query: query.to_string(),
                max_results: config.max_results,
                threshold: config.similarity_threshold,
            };
            let passages = env
                .call(
                    env.capabilities.retriever.retrieve(request),
                    CapabilityError::RetrievalUnavailable(format!(
                        "timed out after {}s",
                        env.config.node_timeout_secs
                    )),
                )
                .await?;

            let returned = passages.len();
            let ranked = rank_passages(passages, config.similarity_threshold, config.max_results);
            debug!(node_id = %node.id, returned, kept = ranked.len(), "Retrieval ranked");

            Ok(vec![(port::CONTEXT, PortValue::RetrievedContext(ranked))])
        })
    }
}

/// Keep passages at or above `threshold`, best first, at most `max_results`.
///
/// Ties in similarity are ordered by ascending passage id.
pub fn rank_passages(mut passages: Vec<Passage>, threshold: f64, max_results: usize) -> Vec<Passage> {
    passages.retain(|p| p.similarity >= threshold);
    passages.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
    passages.truncate(max_results);
    passages
}
