//! Capabilities replayed from a JSON fixture file.
//!
//! ```json
//! {
//!   "passages": [{"passage_id": "doc-1", "text": "X is Y.", "similarity": 0.91}],
//!   "generation": "X is Y.",
//!   "web_hits": [{"title": "X", "snippet": "X is Y", "url": "https://x.example"}],
//!   "failures": {"generate": "provider returned 503"},
//!   "delay_ms": 0
//! }
//! ```
//!
//! Without `generation` the generator echoes its prompt.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::BoxFuture;
use serde::Deserialize;

use stackflow_core::error::{CapabilityError, CapabilityResult};
use stackflow_core::traits::{Generator, Retriever, WebSearch};
use stackflow_core::types::{Capabilities, GenerationRequest, Passage, RetrievalRequest, SearchHit};

#[derive(Debug, Default, Deserialize)]
pub struct FixtureFailures {
    pub retrieve: Option<String>,
    pub generate: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub web_hits: Vec<SearchHit>,
    #[serde(default)]
    pub failures: FixtureFailures,
    /// Added latency for every capability call.
    #[serde(default)]
    pub delay_ms: u64,
}

pub struct ReplayCapabilities {
    fixture: Fixture,
}

impl ReplayCapabilities {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixtures from {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("parsing fixtures in {}", path.display()))?;
        Ok(Self::new(fixture))
    }

    /// Share one replay source across all three capability slots.
    pub fn into_capabilities(self) -> Capabilities {
        let shared = Arc::new(self);
        Capabilities::new(shared.clone(), shared.clone(), shared)
    }

    async fn pause(&self) {
        if self.fixture.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.fixture.delay_ms)).await;
        }
    }
}

impl Retriever for ReplayCapabilities {
    fn retrieve(&self, _request: RetrievalRequest) -> BoxFuture<'_, CapabilityResult<Vec<Passage>>> {
        Box::pin(async move {
            self.pause().await;
            match &self.fixture.failures.retrieve {
                Some(msg) => Err(CapabilityError::RetrievalUnavailable(msg.clone())),
                None => Ok(self.fixture.passages.clone()),
            }
        })
    }
}

impl Generator for ReplayCapabilities {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, CapabilityResult<String>> {
        Box::pin(async move {
            self.pause().await;
            if let Some(msg) = &self.fixture.failures.generate {
                return Err(CapabilityError::GenerationUnavailable(msg.clone()));
            }
            Ok(self
                .fixture
                .generation
                .clone()
                .unwrap_or(request.prompt))
        })
    }
}

impl WebSearch for ReplayCapabilities {
    fn search(&self, _query: String) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>> {
        Box::pin(async move {
            self.pause().await;
            match &self.fixture.failures.search {
                Some(msg) => Err(CapabilityError::SearchUnavailable(msg.clone())),
                None => Ok(self.fixture.web_hits.clone()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            model: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_echoes_prompt_without_generation() {
        let replay = ReplayCapabilities::new(Fixture::default());
        assert_eq!(replay.generate(request("hello")).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_fixture_failures_map_to_capability_errors() {
        let fixture: Fixture = serde_json::from_str(
            r#"{"generation": "unused", "failures": {"generate": "503", "search": "quota"}}"#,
        )
        .unwrap();
        let replay = ReplayCapabilities::new(fixture);

        assert_eq!(
            replay.generate(request("p")).await.unwrap_err(),
            CapabilityError::GenerationUnavailable("503".into())
        );
        assert_eq!(
            replay.search("q".into()).await.unwrap_err(),
            CapabilityError::SearchUnavailable("quota".into())
        );
        assert!(replay
            .retrieve(RetrievalRequest {
                query: "q".into(),
                max_results: 5,
                threshold: 0.7,
            })
            .await
            .unwrap()
            .is_empty());
    }
}
