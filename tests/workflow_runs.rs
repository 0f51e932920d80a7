use std::time::Duration;

use serde_json::{json, Value};

use stackflow_core::config::EngineConfig;
use stackflow_core::error::CapabilityError;
use stackflow_core::types::{Passage, SearchHit};
use stackflow_engine::graph::{schedule, validate_structure, StructuralError};
use stackflow_engine::{execute, load_graph, Engine, FailureReason, NodeFailure, RunStatus};
use stackflow_test_utils::{MockCapabilities, MockGenerator, MockRetriever, MockWebSearch};

fn pipeline(response_format: &str, llm_config: Value) -> Value {
    json!({
        "nodes": [
            {"id": "q1", "type": "user_query", "data": {"configuration": {"placeholder": "Ask anything"}}},
            {"id": "kb1", "type": "knowledge_base", "data": {"configuration": {"similarity_threshold": 0.7}}},
            {"id": "l1", "type": "llm_engine", "data": {"configuration": llm_config}},
            {"id": "o1", "type": "output", "data": {"configuration": {"response_format": response_format}}}
        ],
        "edges": [
            {"id": "e1", "source": "q1", "sourceHandle": "query", "target": "kb1", "targetHandle": "query"},
            {"id": "e2", "source": "kb1", "sourceHandle": "context", "target": "l1", "targetHandle": "context"},
            {"id": "e3", "source": "l1", "sourceHandle": "output", "target": "o1", "targetHandle": "output"}
        ]
    })
}

#[test]
fn test_linear_chain_schedules_in_order() {
    let graph = load_graph(&pipeline("text", json!({}))).expect("load");
    assert_eq!(schedule(&graph).unwrap(), vec!["q1", "kb1", "l1", "o1"]);
}

#[test]
fn test_fan_in_reported_before_cycle() {
    // kb1 -> l1 -> kb1 is a cycle, but l1.query also has two writers.
    let definition = json!({
        "nodes": [
            {"id": "q1", "type": "user_query"},
            {"id": "q2", "type": "user_query"},
            {"id": "kb1", "type": "knowledge_base"},
            {"id": "l1", "type": "llm_engine"},
            {"id": "o1", "type": "output"}
        ],
        "edges": [
            {"id": "a", "source": "q1", "target": "l1", "targetHandle": "query"},
            {"id": "b", "source": "q2", "target": "l1", "targetHandle": "query"},
            {"id": "c", "source": "kb1", "target": "l1", "targetHandle": "context"},
            {"id": "d", "source": "l1", "target": "kb1", "targetHandle": "query"},
            {"id": "e", "source": "l1", "target": "o1"}
        ]
    });
    let graph = load_graph(&definition).expect("load");
    let err = validate_structure(&graph).unwrap_err();
    assert_eq!(
        err,
        StructuralError::MultipleWriters {
            node_id: "l1".into(),
            port: "query".into(),
            edges: vec!["a".into(), "b".into()],
        }
    );
}

#[tokio::test]
async fn test_scenario_success() {
    let mocks = MockCapabilities::answering("X is Y.");
    let graph = load_graph(&pipeline("text", json!({}))).expect("load");

    let result = execute(&graph, "What is X?", &mocks.capabilities()).await;
    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.output_text(), Some("X is Y."));
    assert!(result.failures.is_empty());

    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["status"], "succeeded");
    assert_eq!(serialized["output"], "X is Y.");
}

#[tokio::test]
async fn test_scenario_generation_timeout() {
    let mocks = MockCapabilities::new(
        MockRetriever::with_passages(vec![Passage::new("doc-1", "X is a letter.", 0.92)]),
        MockGenerator::failing(CapabilityError::GenerationTimeout),
        MockWebSearch::default(),
    );
    let graph = load_graph(&pipeline("text", json!({}))).expect("load");

    let result = execute(&graph, "What is X?", &mocks.capabilities()).await;
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.output, None);
    assert_eq!(
        result.failures,
        vec![NodeFailure::node(
            "l1",
            FailureReason::Capability(CapabilityError::GenerationTimeout)
        )]
    );

    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["output"], Value::Null);
    assert_eq!(serialized["failures"][0]["nodeId"], "l1");
    assert_eq!(serialized["failures"][0]["reason"]["detail"]["kind"], "generation_timeout");
}

#[tokio::test]
async fn test_scenario_json_format() {
    let mocks = MockCapabilities::answering("hello");
    let graph = load_graph(&pipeline("json", json!({}))).expect("load");

    let result = execute(&graph, "q", &mocks.capabilities()).await;
    assert_eq!(result.output_text(), Some(r#"{"response": "hello"}"#));
}

#[tokio::test]
async fn test_custom_prompt_with_web_search() {
    let mocks = MockCapabilities::new(
        MockRetriever::with_passages(vec![
            Passage::new("b", "Second.", 0.8),
            Passage::new("a", "First.", 0.9),
            Passage::new("c", "Dropped.", 0.5),
        ]),
        MockGenerator::replying("done"),
        MockWebSearch::with_hits(vec![
            SearchHit::new("One", "first hit", "https://one.example"),
            SearchHit::new("Two", "second hit", "https://two.example"),
        ]),
    );
    let graph = load_graph(&pipeline(
        "markdown",
        json!({
            "prompt": "Use this:\n{context}\n\nQ: {query}",
            "use_web_search": "true",
            "max_tokens": "500"
        }),
    ))
    .expect("load");
    let mut config = EngineConfig::default();
    config.web_search_results = 1;

    let result = Engine::new(config)
        .execute(&graph, "What is X?", &mocks.capabilities())
        .await;
    assert_eq!(result.output_text(), Some("done"));

    let calls = mocks.generator.calls();
    assert_eq!(calls[0].max_tokens, 500);
    assert_eq!(
        calls[0].prompt,
        "Use this:\nDocument 1: First.\n\nDocument 2: Second.\n\n\
         Web results:\n1. One: first hit (https://one.example)\n\nQ: What is X?"
    );
}

#[tokio::test]
async fn test_slow_generation_hits_node_timeout() {
    let mocks = MockCapabilities::new(
        MockRetriever::default(),
        MockGenerator::replying("late").with_delay(Duration::from_secs(3)),
        MockWebSearch::default(),
    );
    let graph = load_graph(&pipeline("text", json!({}))).expect("load");
    let mut config = EngineConfig::default();
    config.node_timeout_secs = 1;

    let result = Engine::new(config)
        .execute(&graph, "What is X?", &mocks.capabilities())
        .await;
    assert_eq!(
        result.failures,
        vec![NodeFailure::node(
            "l1",
            FailureReason::Capability(CapabilityError::GenerationTimeout)
        )]
    );
}

#[tokio::test]
async fn test_llm_without_knowledge_base() {
    let definition = json!({
        "nodes": [
            {"id": "q1", "type": "user_query"},
            {"id": "l1", "type": "llm_engine"},
            {"id": "o1", "type": "output"}
        ],
        "edges": [
            {"source": "q1", "target": "l1"},
            {"source": "l1", "target": "o1"}
        ]
    });
    let mocks = MockCapabilities::answering("direct");
    let graph = load_graph(&definition).expect("load");

    let result = execute(&graph, "What is X?", &mocks.capabilities()).await;
    assert_eq!(result.output_text(), Some("direct"));
    assert_eq!(mocks.generator.prompts(), vec!["What is X?".to_string()]);
    assert!(mocks.retriever.calls().is_empty());
}
