// Embedding provider seam
use async_trait::async_trait;

use crate::errors::Result;

/// Something that turns texts into dense vectors.
///
/// Implementations return exactly one vector per input text, in input
/// order, each of length `dimension()`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// Length of every returned vector
    fn dimension(&self) -> usize;

    /// Embed a batch of texts
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
