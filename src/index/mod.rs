// Vector index seam and backends
//
// Components:
// - VectorIndex: upsert chunks, cosine top-k search
// - MemoryIndex: flat exact search, ephemeral per process (default)
// - QdrantIndex: Qdrant collection with hashed point ids

pub mod memory;
pub mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::{point_id, QdrantIndex, DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};

use async_trait::async_trait;

use crate::errors::{BenchError, Result};
use crate::types::Chunk;

/// Nearest-neighbour store over chunk embeddings.
///
/// Search results are chunks without their vectors, with
/// `similarity_score` set, in descending score order.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Vector length accepted by this index
    fn dimension(&self) -> usize;

    /// Insert or overwrite chunks by `chunk_id`. Returns the number stored.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize>;

    /// At most `top_k` nearest chunks by cosine similarity
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<Chunk>>;

    /// Number of stored chunks
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Embedding of a chunk about to be stored, checked against `dimension`
pub(crate) fn checked_embedding(chunk: &Chunk, dimension: usize) -> Result<&[f32]> {
    let embedding = chunk.embedding().ok_or_else(|| {
        BenchError::DataError(format!("chunk {} has no embedding", chunk.chunk_id))
    })?;
    check_query(embedding, dimension).map_err(|_| {
        BenchError::DataError(format!(
            "chunk {} has dimension {}, index expects {}",
            chunk.chunk_id,
            embedding.len(),
            dimension
        ))
    })?;
    Ok(embedding)
}

pub(crate) fn check_query(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(BenchError::DataError(format!(
            "vector has dimension {}, index expects {}",
            vector.len(),
            dimension
        )));
    }
    Ok(())
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
