use serde::{Deserialize, Serialize};

use stackflow_core::types::Passage;

use super::node::{NodeKind, ResponseFormat};

pub const QUERY: &str = "query";
pub const CONTEXT: &str = "context";
pub const OUTPUT: &str = "output";
pub const RESULT: &str = "result";

/// The kind of value a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Raw user string.
    Text,
    /// Ranked passages with scores.
    RetrievedContext,
    /// Model output string.
    GeneratedText,
    /// Final rendered string.
    FormattedOutput,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PortType::Text => "Text",
            PortType::RetrievedContext => "RetrievedContext",
            PortType::GeneratedText => "GeneratedText",
            PortType::FormattedOutput => "FormattedOutput",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// A named, typed slot declared by a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub ty: PortType,
}

const fn port(name: &'static str, ty: PortType) -> PortSpec {
    PortSpec { name, ty }
}

const USER_QUERY_OUT: &[PortSpec] = &[port(QUERY, PortType::Text)];
const KNOWLEDGE_BASE_IN: &[PortSpec] = &[port(QUERY, PortType::Text)];
const KNOWLEDGE_BASE_OUT: &[PortSpec] = &[port(CONTEXT, PortType::RetrievedContext)];
const LLM_IN: &[PortSpec] = &[
    port(CONTEXT, PortType::RetrievedContext),
    port(QUERY, PortType::Text),
];
const LLM_OUT: &[PortSpec] = &[port(OUTPUT, PortType::GeneratedText)];
const OUTPUT_IN: &[PortSpec] = &[port(OUTPUT, PortType::GeneratedText)];
const OUTPUT_OUT: &[PortSpec] = &[port(RESULT, PortType::FormattedOutput)];

impl NodeKind {
    pub fn inputs(self) -> &'static [PortSpec] {
        match self {
            NodeKind::UserQuery => &[],
            NodeKind::KnowledgeBase => KNOWLEDGE_BASE_IN,
            NodeKind::LlmEngine => LLM_IN,
            NodeKind::Output => OUTPUT_IN,
        }
    }

    pub fn outputs(self) -> &'static [PortSpec] {
        match self {
            NodeKind::UserQuery => USER_QUERY_OUT,
            NodeKind::KnowledgeBase => KNOWLEDGE_BASE_OUT,
            NodeKind::LlmEngine => LLM_OUT,
            NodeKind::Output => OUTPUT_OUT,
        }
    }

    pub fn input(self, name: &str) -> Option<PortSpec> {
        self.inputs().iter().copied().find(|p| p.name == name)
    }

    pub fn output(self, name: &str) -> Option<PortSpec> {
        self.outputs().iter().copied().find(|p| p.name == name)
    }

    pub fn port(self, direction: PortDirection, name: &str) -> Option<PortSpec> {
        match direction {
            PortDirection::Input => self.input(name),
            PortDirection::Output => self.output(name),
        }
    }
}

/// Final rendered output of an output node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedOutput {
    pub format: ResponseFormat,
    pub content: String,
}

/// A value produced on an output port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Text(String),
    RetrievedContext(Vec<Passage>),
    GeneratedText(String),
    FormattedOutput(FormattedOutput),
}

impl PortValue {
    pub fn port_type(&self) -> PortType {
        match self {
            PortValue::Text(_) => PortType::Text,
            PortValue::RetrievedContext(_) => PortType::RetrievedContext,
            PortValue::GeneratedText(_) => PortType::GeneratedText,
            PortValue::FormattedOutput(_) => PortType::FormattedOutput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_tables() {
        assert!(NodeKind::UserQuery.inputs().is_empty());
        assert_eq!(NodeKind::UserQuery.output(QUERY).unwrap().ty, PortType::Text);
        assert_eq!(
            NodeKind::KnowledgeBase.output(CONTEXT).unwrap().ty,
            PortType::RetrievedContext
        );
        assert_eq!(NodeKind::LlmEngine.inputs().len(), 2);
        assert_eq!(
            NodeKind::Output.output(RESULT).unwrap().ty,
            PortType::FormattedOutput
        );
    }

    #[test]
    fn test_port_lookup_respects_direction() {
        // `output` is an input on Output nodes but an output on LLM nodes.
        assert!(NodeKind::Output.port(PortDirection::Input, OUTPUT).is_some());
        assert!(NodeKind::Output.port(PortDirection::Output, OUTPUT).is_none());
        assert!(NodeKind::LlmEngine.port(PortDirection::Output, OUTPUT).is_some());
        assert!(NodeKind::LlmEngine.port(PortDirection::Input, OUTPUT).is_none());
    }

    #[test]
    fn test_every_kind_has_one_output() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.outputs().len(), 1, "{kind}");
        }
    }
}
