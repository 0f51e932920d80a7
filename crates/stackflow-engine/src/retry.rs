use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use stackflow_core::config::RetryConfig;
use stackflow_core::error::CapabilityResult;
use stackflow_core::traits::Generator;
use stackflow_core::types::GenerationRequest;

/// A generator that retries transient failures with exponential backoff.
pub struct RetryingGenerator {
    inner: Arc<dyn Generator>,
    retry_config: RetryConfig,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn Generator>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl Generator for RetryingGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, CapabilityResult<String>> {
        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut attempt = 0;
            loop {
                match self.inner.generate(request.clone()).await {
                    Ok(text) => return Ok(text),
                    Err(e) if e.is_transient() && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying generation"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

/// Wrap a generator unless retries are disabled.
pub fn with_retries(generator: Arc<dyn Generator>, config: &RetryConfig) -> Arc<dyn Generator> {
    if config.max_retries == 0 {
        generator
    } else {
        Arc::new(RetryingGenerator::new(generator, config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::error::CapabilityError;
    use stackflow_test_utils::MockGenerator;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "What is X?".into(),
            model: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        };
        let first = calculate_backoff(0, &config);
        assert!(first >= Duration::from_millis(800) && first <= Duration::from_millis(1200));
        let late = calculate_backoff(9, &config);
        assert!(late <= Duration::from_millis(36_000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let inner = Arc::new(MockGenerator::scripted(vec![
            Err(CapabilityError::GenerationTimeout),
            Err(CapabilityError::GenerationUnavailable("503".into())),
            Ok("X is Y.".into()),
        ]));
        let gen = RetryingGenerator::new(inner.clone(), fast());

        assert_eq!(gen.generate(request()).await.unwrap(), "X is Y.");
        assert_eq!(inner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(MockGenerator::failing(CapabilityError::GenerationTimeout));
        let gen = RetryingGenerator::new(inner.clone(), fast());

        let err = gen.generate(request()).await.unwrap_err();
        assert_eq!(err, CapabilityError::GenerationTimeout);
        assert_eq!(inner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let inner = Arc::new(MockGenerator::failing(CapabilityError::SearchUnavailable(
            "not a generation error".into(),
        )));
        let gen = RetryingGenerator::new(inner.clone(), fast());

        assert!(gen.generate(request()).await.is_err());
        assert_eq!(inner.calls().len(), 1);
    }
}
