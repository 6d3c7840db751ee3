use async_trait::async_trait;

use crate::error::EmbeddingResult;

/// External embedding generation service
///
/// Implementations wrap a concrete API (OpenAI, Vertex AI, a local model) and
/// return one fixed-length vector per text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding of `text` with `model`
    async fn embed(&self, model: &str, text: &str) -> EmbeddingResult<Vec<f32>>;
}
