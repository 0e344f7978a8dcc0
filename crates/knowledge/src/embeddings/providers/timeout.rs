//! Deadline wrapper for embedding providers.

use crate::embeddings::provider::EmbeddingProvider;
use qabase_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Bounds every call of the inner provider by a fixed deadline.
///
/// Identity is delegated, so wrapping a provider does not change which
/// persisted indices it can load.
#[derive(Debug)]
pub struct TimeoutProvider {
    inner: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TimeoutProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        tokio::time::timeout(self.timeout, self.inner.embed_batch(texts))
            .await
            .map_err(|_| {
                AppError::Embedding(format!(
                    "Embedding {} texts timed out after {:?}",
                    texts.len(),
                    self.timeout
                ))
            })?
    }
}
