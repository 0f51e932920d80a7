use futures::future::BoxFuture;

use crate::failure::FailureReason;
use crate::graph::{port, FormattedOutput, Node, NodeConfig, NodeKind, PortValue, ResponseFormat};

use super::{kind_mismatch, ExecutionEnv, NodeExecutor, NodeInputs, NodeOutcome};

/// Renders generated text in the node's response format.
pub struct OutputExecutor;

impl NodeExecutor for OutputExecutor {
    fn execute<'a>(
        &'a self,
        node: &'a Node,
        inputs: NodeInputs<'a>,
        _env: &'a ExecutionEnv<'a>,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(async move {
            let NodeConfig::Output(config) = &node.config else {
                return Err(kind_mismatch(node, NodeKind::Output));
            };
            let text = inputs
                .generated(port::OUTPUT)
                .ok_or_else(|| FailureReason::MissingInput {
                    port: port::OUTPUT.to_string(),
                })?;
            let rendered = render(config.response_format, text)?;
            Ok(vec![(port::RESULT, PortValue::FormattedOutput(rendered))])
        })
    }
}

/// Text and markdown pass through; json wraps as `{"response": <text>}`.
pub fn render(format: ResponseFormat, text: &str) -> Result<FormattedOutput, FailureReason> {
    let content = match format {
        ResponseFormat::Text | ResponseFormat::Markdown => text.to_string(),
        ResponseFormat::Json => {
            let encoded = serde_json::to_string(text)
                .map_err(|e| FailureReason::Internal(format!("json encoding failed: {e}")))?;
            format!("{{\"response\": {encoded}}}")
        }
    };
    Ok(FormattedOutput { format, content })
}
