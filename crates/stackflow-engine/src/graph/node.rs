use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// The closed set of component kinds a stack can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    UserQuery,
    KnowledgeBase,
    LlmEngine,
    Output,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::UserQuery,
        NodeKind::KnowledgeBase,
        NodeKind::LlmEngine,
        NodeKind::Output,
    ];

    /// Parse the builder's type tag (`user_query`, `knowledge_base`, ...).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user_query" => Some(NodeKind::UserQuery),
            "knowledge_base" => Some(NodeKind::KnowledgeBase),
            "llm_engine" => Some(NodeKind::LlmEngine),
            "output" => Some(NodeKind::Output),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::UserQuery => "user_query",
            NodeKind::KnowledgeBase => "knowledge_base",
            NodeKind::LlmEngine => "llm_engine",
            NodeKind::Output => "output",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A configuration value that failed coercion into its typed record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("node '{node_id}': config '{key}' {reason}")]
pub struct ConfigError {
    pub node_id: String,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserQueryConfig {
    /// Shown in the chat input; has no effect on execution.
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    pub max_results: usize,
    pub similarity_threshold: f64,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Template with `{context}` and `{query}` placeholders.
    pub prompt: Option<String>,
    pub use_web_search: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            prompt: None,
            use_web_search: false,
        }
    }
}

/// How the output node renders generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub response_format: ResponseFormat,
}

/// Strict per-kind configuration. The variant determines the node's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    UserQuery(UserQueryConfig),
    KnowledgeBase(KnowledgeBaseConfig),
    LlmEngine(LlmConfig),
    Output(OutputConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::UserQuery(_) => NodeKind::UserQuery,
            NodeConfig::KnowledgeBase(_) => NodeKind::KnowledgeBase,
            NodeConfig::LlmEngine(_) => NodeKind::LlmEngine,
            NodeConfig::Output(_) => NodeKind::Output,
        }
    }

    /// Coerce the builder's loosely-typed option bag into the strict record
    /// for `kind`. Unknown keys are ignored and missing keys take defaults.
    pub fn from_options(
        node_id: &str,
        kind: NodeKind,
        options: &Map<String, Value>,
    ) -> Result<Self, ConfigError> {
        let opts = Options { node_id, map: options };
        match kind {
            NodeKind::UserQuery => Ok(NodeConfig::UserQuery(UserQueryConfig {
                placeholder: opts.string("placeholder")?,
            })),
            NodeKind::KnowledgeBase => {
                let max_results = opts
                    .integer("max_results", 1, 20)?
                    .map_or(DEFAULT_MAX_RESULTS, |v| v as usize);
                let similarity_threshold = opts
                    .number("similarity_threshold", 0.0, 1.0)?
                    .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
                Ok(NodeConfig::KnowledgeBase(KnowledgeBaseConfig {
                    max_results,
                    similarity_threshold,
                }))
            }
            NodeKind::LlmEngine => {
                let model = match opts.string("model")? {
                    Some(m) if m.trim().is_empty() => {
                        return Err(opts.error("model", "must not be empty"))
                    }
                    Some(m) => m,
                    None => DEFAULT_MODEL.to_string(),
                };
                Ok(NodeConfig::LlmEngine(LlmConfig {
                    model,
                    temperature: opts
                        .number("temperature", 0.0, 2.0)?
                        .unwrap_or(DEFAULT_TEMPERATURE),
                    max_tokens: opts
                        .integer("max_tokens", 100, 4000)?
                        .map_or(DEFAULT_MAX_TOKENS, |v| v as u32),
                    prompt: opts.string("prompt")?.filter(|p| !p.trim().is_empty()),
                    use_web_search: opts.boolean("use_web_search")?.unwrap_or(false),
                }))
            }
            NodeKind::Output => {
                let response_format = match opts.string("response_format")?.as_deref() {
                    None | Some("text") => ResponseFormat::Text,
                    Some("markdown") => ResponseFormat::Markdown,
                    Some("json") => ResponseFormat::Json,
                    Some(other) => {
                        return Err(opts.error(
                            "response_format",
                            format!("must be one of text, markdown, json (got '{}')", other),
                        ))
                    }
                };
                Ok(NodeConfig::Output(OutputConfig { response_format }))
            }
        }
    }
}

/// Typed accessors over a raw option map. `null` counts as missing.
struct Options<'a> {
    node_id: &'a str,
    map: &'a Map<String, Value>,
}

impl Options<'_> {
    fn error(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError {
            node_id: self.node_id.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.error(key, format!("must be a string (got {})", other))),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(other) => Err(self.error(key, format!("must be a boolean (got {})", other))),
        }
    }

    fn raw_number(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.error(key, "is not representable as a number")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.error(key, format!("must be a number (got \"{}\")", s))),
            Some(other) => Err(self.error(key, format!("must be a number (got {})", other))),
        }
    }

    fn number(&self, key: &str, min: f64, max: f64) -> Result<Option<f64>, ConfigError> {
        let Some(v) = self.raw_number(key)? else {
            return Ok(None);
        };
        if !v.is_finite() || v < min || v > max {
            return Err(self.error(key, format!("must be within {}..={} (got {})", min, max, v)));
        }
        Ok(Some(v))
    }

    fn integer(&self, key: &str, min: u64, max: u64) -> Result<Option<u64>, ConfigError> {
        let Some(v) = self.raw_number(key)? else {
            return Ok(None);
        };
        if v.fract() != 0.0 {
            return Err(self.error(key, format!("must be a whole number (got {})", v)));
        }
        if v < min as f64 || v > max as f64 {
            return Err(self.error(key, format!("must be within {}..={} (got {})", min, max, v)));
        }
        Ok(Some(v as u64))
    }
}

/// A configured processing step in a workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn user_query(id: impl Into<String>) -> Self {
        Self::new(id, NodeConfig::UserQuery(UserQueryConfig::default()))
    }

    pub fn knowledge_base(id: impl Into<String>, config: KnowledgeBaseConfig) -> Self {
        Self::new(id, NodeConfig::KnowledgeBase(config))
    }

    pub fn llm_engine(id: impl Into<String>, config: LlmConfig) -> Self {
        Self::new(id, NodeConfig::LlmEngine(config))
    }

    pub fn output(id: impl Into<String>, response_format: ResponseFormat) -> Self {
        Self::new(id, NodeConfig::Output(OutputConfig { response_format }))
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let cfg = NodeConfig::from_options("kb1", NodeKind::KnowledgeBase, &Map::new()).unwrap();
        assert_eq!(cfg, NodeConfig::KnowledgeBase(KnowledgeBaseConfig::default()));

        let cfg = NodeConfig::from_options("l1", NodeKind::LlmEngine, &Map::new()).unwrap();
        assert_eq!(cfg, NodeConfig::LlmEngine(LlmConfig::default()));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let cfg = NodeConfig::from_options(
            "o1",
            NodeKind::Output,
            &opts(json!({"response_format": "json", "color": "blue"})),
        )
        .unwrap();
        assert_eq!(
            cfg,
            NodeConfig::Output(OutputConfig {
                response_format: ResponseFormat::Json
            })
        );
    }

    #[test]
    fn test_numeric_strings_and_bool_strings_coerced() {
        let cfg = NodeConfig::from_options(
            "l1",
            NodeKind::LlmEngine,
            &opts(json!({
                "temperature": "1.5",
                "max_tokens": "2000",
                "use_web_search": "true",
                "model": "gpt-4"
            })),
        )
        .unwrap();
        let NodeConfig::LlmEngine(llm) = cfg else {
            panic!("expected llm config");
        };
        assert_eq!(llm.temperature, 1.5);
        assert_eq!(llm.max_tokens, 2000);
        assert!(llm.use_web_search);
        assert_eq!(llm.model, "gpt-4");
    }

    #[test]
    fn test_out_of_range_rejected_not_clamped() {
        let err = NodeConfig::from_options(
            "kb1",
            NodeKind::KnowledgeBase,
            &opts(json!({"max_results": 50})),
        )
        .unwrap_err();
        assert_eq!(err.node_id, "kb1");
        assert_eq!(err.key, "max_results");
        assert!(err.reason.contains("1..=20"));

        let err = NodeConfig::from_options(
            "l1",
            NodeKind::LlmEngine,
            &opts(json!({"temperature": 2.5})),
        )
        .unwrap_err();
        assert_eq!(err.key, "temperature");

        let err = NodeConfig::from_options(
            "l1",
            NodeKind::LlmEngine,
            &opts(json!({"max_tokens": 50})),
        )
        .unwrap_err();
        assert_eq!(err.key, "max_tokens");
    }

    #[test]
    fn test_fractional_integer_rejected() {
        let err = NodeConfig::from_options(
            "kb1",
            NodeKind::KnowledgeBase,
            &opts(json!({"max_results": 2.5})),
        )
        .unwrap_err();
        assert!(err.reason.contains("whole number"));

        // A whole float is fine.
        let cfg = NodeConfig::from_options(
            "kb1",
            NodeKind::KnowledgeBase,
            &opts(json!({"max_results": 3.0})),
        )
        .unwrap();
        assert_eq!(
            cfg,
            NodeConfig::KnowledgeBase(KnowledgeBaseConfig {
                max_results: 3,
                similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD
            })
        );
    }

    #[test]
    fn test_wrong_types_rejected() {
        let err = NodeConfig::from_options(
            "l1",
            NodeKind::LlmEngine,
            &opts(json!({"use_web_search": 1})),
        )
        .unwrap_err();
        assert_eq!(err.key, "use_web_search");

        let err = NodeConfig::from_options(
            "o1",
            NodeKind::Output,
            &opts(json!({"response_format": "html"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("html"));

        let err = NodeConfig::from_options("l1", NodeKind::LlmEngine, &opts(json!({"model": " "})))
            .unwrap_err();
        assert_eq!(err.key, "model");
    }

    #[test]
    fn test_blank_prompt_treated_as_absent() {
        let cfg =
            NodeConfig::from_options("l1", NodeKind::LlmEngine, &opts(json!({"prompt": ""})))
                .unwrap();
        let NodeConfig::LlmEngine(llm) = cfg else {
            panic!("expected llm config");
        };
        assert!(llm.prompt.is_none());
    }

    #[test]
    fn test_null_values_count_as_missing() {
        let cfg = NodeConfig::from_options(
            "kb1",
            NodeKind::KnowledgeBase,
            &opts(json!({"max_results": null, "similarity_threshold": null})),
        )
        .unwrap();
        assert_eq!(cfg, NodeConfig::KnowledgeBase(KnowledgeBaseConfig::default()));
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(NodeKind::from_tag("vector_db"), None);
    }
}
