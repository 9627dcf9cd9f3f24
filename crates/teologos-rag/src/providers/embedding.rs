//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use super::retry::RetryPolicy;
use crate::error::{Error, Result};

/// Inputs per provider request when the implementation does not say otherwise
pub const DEFAULT_EMBED_BATCH: usize = 32;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI `/embeddings` endpoint
///
/// `embed` and `embed_query` surface failures immediately. Only
/// `embed_with_retry` retries, and only the batch that failed.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One provider round trip. Output order must match `texts`.
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Maximum inputs per `embed_request`
    fn batch_size(&self) -> usize {
        DEFAULT_EMBED_BATCH
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Embed any number of texts, batch by batch, preserving input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_retry(texts, &RetryPolicy::once()).await
    }

    /// Like `embed`, retrying each failed batch under `policy`
    async fn embed_with_retry(
        &self,
        texts: &[String],
        policy: &RetryPolicy,
    ) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.batch_size().max(1);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            let vectors = policy.run(|_| self.embed_request(batch)).await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} inputs",
                    self.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            tracing::debug!("Embedded batch {} ({} texts) via {}", i + 1, batch.len(), self.name());
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    /// Embed a single query. An empty vector means the provider gave nothing back.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_request(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }
}
