//! Run orchestration: validate, schedule, execute node by node, collect.
//!
//! A run walks `Pending → Validating → Scheduled → Executing` and ends in
//! `Succeeded` or `Failed`. Node failures do not abort the run; consumers of
//! a failed or skipped node are skipped, and the run succeeds when some
//! output node reachable from a user query rendered a result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stackflow_core::config::EngineConfig;
use stackflow_core::event::EventBus;
use stackflow_core::types::{Capabilities, RunEvent, RunId};

use crate::executor::{
    ExecutionContext, ExecutionEnv, ExecutorRegistry, NodeInputs, NodeOutcome, NodeOutputs,
};
use crate::failure::{FailureReason, NodeFailure};
use crate::graph::{
    check_types, port, schedule, schedule_tiers, validate_structure, FormattedOutput, Graph, Node,
    NodeKind, PortValue, StructuralError,
};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Validating,
    Scheduled,
    Executing,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }

    /// Whether `next` is a legal successor. Phases only move forward, and
    /// any non-terminal phase may fail.
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Scheduled)
                | (Scheduled, Executing)
                | (Executing, Succeeded)
                | (Pending | Validating | Scheduled | Executing, Failed)
        )
    }
}

struct PhaseTracker {
    run_id: RunId,
    phase: RunPhase,
}

impl PhaseTracker {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            phase: RunPhase::Pending,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal run transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(run_id = %self.run_id, from = ?self.phase, to = ?next, "Run phase");
        self.phase = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub status: RunStatus,
    /// Rendered result of the first reachable output node, in schedule order.
    /// Serialized as the rendered text alone.
    #[serde(serialize_with = "serialize_output")]
    pub output: Option<FormattedOutput>,
    /// Every failure observed, in the order it happened.
    pub failures: Vec<NodeFailure>,
}

fn serialize_output<S: serde::Serializer>(
    output: &Option<FormattedOutput>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match output {
        Some(o) => serializer.serialize_some(&o.content),
        None => serializer.serialize_none(),
    }
}

impl RunResult {
    pub fn failed(failures: Vec<NodeFailure>) -> Self {
        Self {
            status: RunStatus::Failed,
            output: None,
            failures,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn output_text(&self) -> Option<&str> {
        self.output.as_ref().map(|o| o.content.as_str())
    }
}

/// Executes workflow graphs against a set of capabilities.
pub struct Engine {
    config: EngineConfig,
    registry: ExecutorRegistry,
    events: Option<Arc<EventBus>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: ExecutorRegistry::standard(),
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn execute(&self, graph: &Graph, query: &str, capabilities: &Capabilities) -> RunResult {
        self.execute_with_cancel(graph, query, capabilities, &CancellationToken::new())
            .await
    }

    pub async fn execute_with_cancel(
        &self,
        graph: &Graph,
        query: &str,
        capabilities: &Capabilities,
        cancel: &CancellationToken,
    ) -> RunResult {
        let run_id = RunId::new();
        let start = Instant::now();
        let mut phase = PhaseTracker::new(run_id.clone());
        info!(run_id = %run_id, nodes = graph.node_count(), edges = graph.edges().len(), "Run started");
        self.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
        });

        let result = self
            .drive(&mut phase, graph, query, capabilities, cancel)
            .await;

        phase.advance(if result.succeeded() {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        });
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            succeeded = result.succeeded(),
            failures = result.failures.len(),
            elapsed_ms,
            "Run finished"
        );
        self.emit(RunEvent::RunFinished {
            run_id,
            succeeded: result.succeeded(),
            elapsed_ms,
        });
        result
    }

    async fn drive(
        &self,
        phase: &mut PhaseTracker,
        graph: &Graph,
        query: &str,
        capabilities: &Capabilities,
        cancel: &CancellationToken,
    ) -> RunResult {
        let run_id = phase.run_id.clone();

        phase.advance(RunPhase::Validating);
        if let Err(e) = validate_structure(graph) {
            warn!(run_id = %run_id, error = %e, "Graph rejected");
            return RunResult::failed(vec![structural_failure(e)]);
        }
        if let Err(mismatches) = check_types(graph) {
            warn!(run_id = %run_id, count = mismatches.len(), "Graph has type mismatches");
            return RunResult::failed(
                mismatches
                    .into_iter()
                    .map(|m| NodeFailure::node(m.target_node.clone(), FailureReason::TypeMismatch(m)))
                    .collect(),
            );
        }

        let (order, batches) = match self.plan(graph) {
            Ok(plan) => plan,
            Err(e) => return RunResult::failed(vec![structural_failure(e)]),
        };
        phase.advance(RunPhase::Scheduled);
        debug!(run_id = %run_id, order = ?order, "Run scheduled");
        self.emit(RunEvent::RunScheduled {
            run_id: run_id.clone(),
            order: order.clone(),
        });

        phase.advance(RunPhase::Executing);
        let env = ExecutionEnv {
            query,
            capabilities,
            config: &self.config,
            cancel,
        };
        let mut ctx = ExecutionContext::new();
        let mut blocked: HashSet<String> = HashSet::new();
        let mut failures = Vec::new();
        let mut cancelled = false;

        for batch in &batches {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let mut ready: Vec<(&Node, NodeInputs<'_>)> = Vec::new();
            for id in batch {
                let Some(node) = graph.node(id) else { continue };
                match gather_inputs(graph, node, &ctx, &blocked) {
                    Some(inputs) => ready.push((node, inputs)),
                    None => {
                        debug!(run_id = %run_id, node_id = %node.id, "Skipping node, upstream failed");
                        self.emit(RunEvent::NodeSkipped {
                            run_id: run_id.clone(),
                            node_id: node.id.clone(),
                        });
                        blocked.insert(node.id.clone());
                    }
                }
            }

            let outcomes = join_all(
                ready
                    .into_iter()
                    .map(|(node, inputs)| self.run_node(&run_id, node, inputs, &env)),
            )
            .await;

            for (node, outcome, elapsed_ms) in outcomes {
                match outcome {
                    Ok(outputs) => {
                        debug!(run_id = %run_id, node_id = %node.id, elapsed_ms, "Node complete");
                        for (port_name, value) in outputs {
                            ctx.put(&node.id, port_name, value);
                        }
                        self.emit(RunEvent::NodeCompleted {
                            run_id: run_id.clone(),
                            node_id: node.id.clone(),
                            elapsed_ms,
                        });
                    }
                    Err(FailureReason::Cancelled) => {
                        cancelled = true;
                        blocked.insert(node.id.clone());
                    }
                    Err(reason) => {
                        error!(run_id = %run_id, node_id = %node.id, error = %reason, "Node failed");
                        self.emit(RunEvent::NodeFailed {
                            run_id: run_id.clone(),
                            node_id: node.id.clone(),
                            reason: reason.to_string(),
                        });
                        blocked.insert(node.id.clone());
                        failures.push(NodeFailure::node(node.id.clone(), reason));
                    }
                }
            }
        }

        if cancelled {
            warn!(run_id = %run_id, "Run cancelled");
            failures.push(NodeFailure::run(FailureReason::Cancelled));
            return RunResult::failed(failures);
        }

        let reachable = graph.reachable_from_kind(NodeKind::UserQuery);
        let output = order
            .iter()
            .filter(|id| reachable.contains(*id))
            .find_map(|id| match ctx.get(id, port::RESULT) {
                Some(PortValue::FormattedOutput(out)) => Some(out.clone()),
                _ => None,
            });

        RunResult {
            status: if output.is_some() {
                RunStatus::Succeeded
            } else {
                RunStatus::Failed
            },
            output,
            failures,
        }
    }

    /// The flat schedule order plus the batches to execute: tiers when
    /// running in parallel, otherwise one node per batch. The order alone
    /// decides which output is reported.
    fn plan(&self, graph: &Graph) -> Result<(Vec<String>, Vec<Vec<String>>), StructuralError> {
        let cycle = |e: crate::graph::CycleError| StructuralError::Cycle { nodes: e.nodes };
        let order = schedule(graph).map_err(cycle)?;
        let batches = if self.config.parallel_tiers {
            schedule_tiers(graph).map_err(cycle)?
        } else {
            order.iter().map(|id| vec![id.clone()]).collect()
        };
        Ok((order, batches))
    }

    async fn run_node<'n>(
        &self,
        run_id: &RunId,
        node: &'n Node,
        inputs: NodeInputs<'_>,
        env: &ExecutionEnv<'_>,
    ) -> (&'n Node, NodeOutcome, u64) {
        let start = Instant::now();
        self.emit(RunEvent::NodeStarted {
            run_id: run_id.clone(),
            node_id: node.id.clone(),
        });
        let outcome = match self.registry.get(node.kind()) {
            Some(executor) => executor
                .execute(node, inputs, env)
                .await
                .and_then(|outputs| check_outputs(node, outputs)),
            None => Err(FailureReason::Internal(format!(
                "no executor registered for {}",
                node.kind()
            ))),
        };
        (node, outcome, start.elapsed().as_millis() as u64)
    }

    fn emit(&self, event: RunEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Run a graph with default engine settings.
pub async fn execute(graph: &Graph, query: &str, capabilities: &Capabilities) -> RunResult {
    Engine::default().execute(graph, query, capabilities).await
}

fn structural_failure(error: StructuralError) -> NodeFailure {
    NodeFailure {
        node_id: error.node_id().map(String::from),
        reason: FailureReason::Structural(error),
    }
}

/// Resolve connected inputs from the context. `None` means an upstream
/// producer failed or was skipped, so this node must be skipped too.
fn gather_inputs<'c>(
    graph: &Graph,
    node: &Node,
    ctx: &'c ExecutionContext,
    blocked: &HashSet<String>,
) -> Option<NodeInputs<'c>> {
    let mut inputs = NodeInputs::new();
    for edge in graph.incoming(&node.id) {
        if blocked.contains(&edge.source) {
            return None;
        }
        let spec = node.kind().input(&edge.target_port)?;
        let value = ctx.get(&edge.source, &edge.source_port)?;
        inputs.insert(spec.name, value);
    }
    Some(inputs)
}

/// Executors must produce exactly the declared output ports, each with the
/// declared value type.
fn check_outputs(node: &Node, outputs: NodeOutputs) -> NodeOutcome {
    let declared = node.kind().outputs();
    for (name, value) in &outputs {
        match node.kind().output(name) {
            Some(spec) if spec.ty == value.port_type() => {}
            _ => {
                return Err(FailureReason::Internal(format!(
                    "executor for '{}' produced unexpected {} on port '{}'",
                    node.id,
                    value.port_type(),
                    name
                )))
            }
        }
    }
    if outputs.len() != declared.len() {
        return Err(FailureReason::Internal(format!(
            "executor for '{}' produced {} outputs, expected {}",
            node.id,
            outputs.len(),
            declared.len()
        )));
    }
    Ok(outputs)
}
