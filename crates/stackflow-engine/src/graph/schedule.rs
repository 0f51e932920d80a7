//! Kahn's algorithm over the node graph.
//!
//! When several nodes become ready at once the lexicographically smallest id
//! runs first, so a graph always yields the same order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::model::Graph;

/// Nodes left with unresolved dependencies after scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("cycle detected among nodes: {}", nodes.join(", "))]
pub struct CycleError {
    /// Sorted ids of every node that could not be scheduled.
    pub nodes: Vec<String>,
}

/// In-degree per node, counting only edges whose endpoints both exist.
fn in_degrees(graph: &Graph) -> BTreeMap<&str, usize> {
    let mut degrees: BTreeMap<&str, usize> = graph.nodes().map(|n| (n.id.as_str(), 0)).collect();
    for edge in graph.edges() {
        if !graph.contains(&edge.source) {
            continue;
        }
        if let Some(d) = degrees.get_mut(edge.target.as_str()) {
            *d += 1;
        }
    }
    degrees
}

fn residual(degrees: &BTreeMap<&str, usize>) -> CycleError {
    CycleError {
        nodes: degrees
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| id.to_string())
            .collect(),
    }
}

/// Release every successor of `id`, returning those that became ready.
fn release<'a>(graph: &'a Graph, id: &'a str, degrees: &mut BTreeMap<&'a str, usize>) -> Vec<&'a str> {
    let mut ready = Vec::new();
    for edge in graph.outgoing(id) {
        if let Some(d) = degrees.get_mut(edge.target.as_str()) {
            *d -= 1;
            if *d == 0 {
                ready.push(edge.target.as_str());
            }
        }
    }
    ready
}

/// Produce a flat execution order.
pub fn schedule(graph: &Graph) -> Result<Vec<String>, CycleError> {
    let mut degrees = in_degrees(graph);
    let mut ready: BinaryHeap<Reverse<&str>> = degrees
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id.to_string());
        for next in release(graph, id, &mut degrees) {
            ready.push(Reverse(next));
        }
    }

    if order.len() < graph.node_count() {
        let err = residual(&degrees);
        debug!(nodes = ?err.nodes, "Scheduling stopped on a cycle");
        return Err(err);
    }
    Ok(order)
}

/// Group nodes into tiers: each tier holds every node whose dependencies are
/// all in earlier tiers. Nodes within a tier are sorted by id.
pub fn schedule_tiers(graph: &Graph) -> Result<Vec<Vec<String>>, CycleError> {
    let mut degrees = in_degrees(graph);
    let mut tier: Vec<&str> = degrees
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut tiers = Vec::new();
    let mut scheduled = 0;
    while !tier.is_empty() {
        scheduled += tier.len();
        let mut next = Vec::new();
        for &id in &tier {
            next.extend(release(graph, id, &mut degrees));
        }
        next.sort_unstable();
        tiers.push(tier.iter().map(|id| id.to_string()).collect());
        tier = next;
    }

    if scheduled < graph.node_count() {
        return Err(residual(&degrees));
    }
    Ok(tiers)
}
