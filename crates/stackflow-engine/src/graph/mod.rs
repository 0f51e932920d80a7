//! Workflow graph model: typed nodes, port-to-port edges, and the checks
//! that gate execution.
//!
//! A workflow is a directed graph of `Node`s whose output ports feed other
//! nodes' input ports through `Edge`s. Before a run, `validate_structure`
//! rejects malformed graphs (dangling edges, multiple writers into one input,
//! cycles, no reachable output) and `check_types` rejects edges between
//! ports of different value types. `schedule` then yields a deterministic
//! execution order.

pub mod definition;
pub mod edge;
pub mod model;
pub mod node;
pub mod port;
pub mod schedule;
pub mod typecheck;
pub mod validate;

pub use definition::{DefinitionError, WorkflowDefinition};
pub use edge::Edge;
pub use model::Graph;
pub use node::{
    ConfigError, KnowledgeBaseConfig, LlmConfig, Node, NodeConfig, NodeKind, OutputConfig,
    ResponseFormat, UserQueryConfig,
};
pub use port::{FormattedOutput, PortDirection, PortSpec, PortType, PortValue};
pub use schedule::{schedule, schedule_tiers, CycleError};
pub use typecheck::{check_types, TypeMismatch};
pub use validate::{validate_structure, StructuralError, ValidationReport};
