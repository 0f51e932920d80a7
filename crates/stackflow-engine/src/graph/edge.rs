use serde::{Deserialize, Serialize};

/// A directed data link from one node's output port to another's input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    /// Producing node id.
    pub source: String,
    pub source_port: String,
    /// Consuming node id.
    pub target: String,
    pub target_port: String,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }

    /// Create an edge whose id is derived from its endpoints.
    pub fn wire(
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let source_port = source_port.into();
        let target = target.into();
        let target_port = target_port.into();
        Self {
            id: format!("{}.{}->{}.{}", source, source_port, target, target_port),
            source,
            source_port,
            target,
            target_port,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}.{} -> {}.{})",
            self.id, self.source, self.source_port, self.target, self.target_port
        )
    }
}
