use futures::future::BoxFuture;
use tracing::{debug, info};

use stackflow_core::error::CapabilityError;
use stackflow_core::types::{GenerationRequest, Passage, SearchHit};

use crate::graph::{port, LlmConfig, Node, NodeConfig, NodeKind, PortValue};

use super::{kind_mismatch, ExecutionEnv, NodeExecutor, NodeInputs, NodeOutcome};

/// Builds a prompt from the node's inputs and calls the generator.
pub struct LlmExecutor;

impl NodeExecutor for LlmExecutor {
    fn execute<'a>(
        &'a self,
        node: &'a Node,
        inputs: NodeInputs<'a>,
        env: &'a ExecutionEnv<'a>,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(async move {
            let NodeConfig::LlmEngine(config) = &node.config else {
                return Err(kind_mismatch(node, NodeKind::LlmEngine));
            };
            // An unconnected query port falls back to the run query.
            let query = inputs.text(port::QUERY).unwrap_or(env.query);
            let mut context = inputs
                .passages(port::CONTEXT)
                .map(render_passages)
                .unwrap_or_default();

            if config.use_web_search {
                let hits = env
                    .call(
                        env.capabilities.web_search.search(query.to_string()),
                        CapabilityError::SearchUnavailable(format!(
                            "timed out after {}s",
                            env.config.node_timeout_secs
                        )),
                    )
                    .await?;
                debug!(node_id = %node.id, hits = hits.len(), "Web search returned");
                append_web_results(&mut context, &hits, env.config.web_search_results);
            }

            let request = GenerationRequest {
                prompt: build_prompt(config, &context, query),
                model: config.model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            };
            info!(
                node_id = %node.id,
                model = %request.model,
                prompt_chars = request.prompt.len(),
                "Calling generator"
            );
            let text = env
                .call(
                    env.capabilities.generator.generate(request),
                    CapabilityError::GenerationTimeout,
                )
                .await?;

            Ok(vec![(port::OUTPUT, PortValue::GeneratedText(text))])
        })
    }
}

/// `Document 1: <text>` blocks separated by blank lines.
pub fn render_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Document {}: {}", i + 1, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Append up to `limit` numbered hits under a `Web results:` heading.
pub fn append_web_results(context: &mut String, hits: &[SearchHit], limit: usize) {
    let hits = &hits[..hits.len().min(limit)];
    if hits.is_empty() {
        return;
    }
    if !context.is_empty() {
        context.push_str("\n\n");
    }
    context.push_str("Web results:");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("\n{}. {}: {} ({})", i + 1, hit.title, hit.snippet, hit.url));
    }
}

pub fn build_prompt(config: &LlmConfig, context: &str, query: &str) -> String {
    match &config.prompt {
        Some(template) => render_template(template, context, query),
        None if context.is_empty() => query.to_string(),
        None => format!("Context: {context}\n\nQuestion: {query}"),
    }
}

/// Substitute `{context}` and `{query}` in one pass, so placeholder text
/// inside the substituted values is left alone.
pub fn render_template(template: &str, context: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{query}") {
            out.push_str(query);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
