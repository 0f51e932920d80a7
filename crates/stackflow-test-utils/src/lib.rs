//! Mock capabilities for exercising the engine without real providers.
//!
//! Every mock records the requests it receives so tests can assert on the
//! exact prompt, query, or limits a node sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use stackflow_core::error::{CapabilityError, CapabilityResult};
use stackflow_core::traits::{Generator, Retriever, WebSearch};
use stackflow_core::types::{
    Capabilities, GenerationRequest, Passage, RetrievalRequest, SearchHit,
};

/// Retriever returning a fixed passage list verbatim (no filtering).
#[derive(Default)]
pub struct MockRetriever {
    passages: Vec<Passage>,
    error: Option<CapabilityError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RetrievalRequest>>,
}

impl MockRetriever {
    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            ..Default::default()
        }
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RetrievalRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Retriever for MockRetriever {
    fn retrieve(&self, request: RetrievalRequest) -> BoxFuture<'_, CapabilityResult<Vec<Passage>>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(self.passages.clone()),
            }
        })
    }
}

/// Generator replaying scripted responses; the last one repeats forever.
pub struct MockGenerator {
    script: Mutex<VecDeque<CapabilityResult<String>>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn scripted(responses: Vec<CapabilityResult<String>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(text.into())])
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.prompt).collect()
    }

    fn next_response(&self) -> CapabilityResult<String> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}

impl Generator for MockGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, CapabilityResult<String>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next_response()
        })
    }
}

/// Web search returning fixed hits.
#[derive(Default)]
pub struct MockWebSearch {
    hits: Vec<SearchHit>,
    error: Option<CapabilityError>,
    calls: Mutex<Vec<String>>,
}

impl MockWebSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebSearch for MockWebSearch {
    fn search(&self, query: String) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(query);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(self.hits.clone()),
            }
        })
    }
}

/// Handles to a set of mocks plus the `Capabilities` that share them.
pub struct MockCapabilities {
    pub retriever: Arc<MockRetriever>,
    pub generator: Arc<MockGenerator>,
    pub web_search: Arc<MockWebSearch>,
}

impl MockCapabilities {
    pub fn new(retriever: MockRetriever, generator: MockGenerator, web_search: MockWebSearch) -> Self {
        Self {
            retriever: Arc::new(retriever),
            generator: Arc::new(generator),
            web_search: Arc::new(web_search),
        }
    }

    /// One passage above the default threshold and a fixed reply.
    pub fn answering(reply: impl Into<String>) -> Self {
        Self::new(
            MockRetriever::with_passages(vec![Passage::new("doc-1", "X is a letter.", 0.92)]),
            MockGenerator::replying(reply),
            MockWebSearch::default(),
        )
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(
            self.retriever.clone(),
            self.generator.clone(),
            self.web_search.clone(),
        )
    }
}
