use futures::future::BoxFuture;

use crate::failure::FailureReason;
use crate::graph::{port, Node, NodeConfig, NodeKind, PortValue};

use super::{kind_mismatch, ExecutionEnv, NodeExecutor, NodeInputs, NodeOutcome};

/// Entry point of a workflow: publishes the run query.
pub struct QueryExecutor;

impl NodeExecutor for QueryExecutor {
    fn execute<'a>(
        &'a self,
        node: &'a Node,
        _inputs: NodeInputs<'a>,
        env: &'a ExecutionEnv<'a>,
    ) -> BoxFuture<'a, NodeOutcome> {
        Box::pin(async move {
            let NodeConfig::UserQuery(_) = &node.config else {
                return Err(kind_mismatch(node, NodeKind::UserQuery));
            };
            if env.query.trim().is_empty() {
                return Err(FailureReason::MissingQuery);
            }
            Ok(vec![(port::QUERY, PortValue::Text(env.query.to_string()))])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::EnvParts;
    use crate::graph::ResponseFormat;

    #[tokio::test]
    async fn test_emits_query_verbatim() {
        let parts = EnvParts::default();
        let env = parts.env("  What is X? ");
        let node = Node::user_query("q1");

        let out = QueryExecutor
            .execute(&node, NodeInputs::new(), &env)
            .await
            .unwrap();
        assert_eq!(out, vec![("query", PortValue::Text("  What is X? ".into()))]);
    }

    #[tokio::test]
    async fn test_blank_query_fails() {
        let parts = EnvParts::default();
        let env = parts.env(" \n\t");
        let node = Node::user_query("q1");

        let err = QueryExecutor
            .execute(&node, NodeInputs::new(), &env)
            .await
            .unwrap_err();
        assert_eq!(err, FailureReason::MissingQuery);
    }

    #[tokio::test]
    async fn test_wrong_kind_is_internal() {
        let parts = EnvParts::default();
        let env = parts.env("q");
        let node = Node::output("o1", ResponseFormat::Text);

        let err = QueryExecutor
            .execute(&node, NodeInputs::new(), &env)
            .await
            .unwrap_err();
        assert!(matches!(err, FailureReason::Internal(_)));
    }
}
