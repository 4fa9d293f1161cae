// In-process flat vector index
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{check_query, checked_embedding, cosine_similarity, VectorIndex};
use crate::errors::{BenchError, Result};
use crate::types::Chunk;

#[derive(Default)]
struct Entries {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

/// Exact cosine search over every stored chunk.
///
/// Keys are chunk ids as-is, so no id hashing is involved. Contents live
/// only as long as the process.
pub struct MemoryIndex {
    dimension: usize,
    entries: RwLock<Entries>,
}

impl MemoryIndex {
    /// Create empty index for vectors of `dimension`
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(BenchError::ConfigError(
                "index dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            entries: RwLock::new(Entries::default()),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>> {
        self.entries
            .read()
            .map_err(|_| BenchError::IndexError("memory index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>> {
        self.entries
            .write()
            .map_err(|_| BenchError::IndexError("memory index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        // Validate the whole batch before touching the store
        for chunk in chunks {
            checked_embedding(chunk, self.dimension)?;
        }

        let mut entries = self.write()?;
        for chunk in chunks {
            match entries.positions.get(&chunk.chunk_id).copied() {
                Some(pos) => entries.chunks[pos] = chunk.clone(),
                None => {
                    let pos = entries.chunks.len();
                    entries.positions.insert(chunk.chunk_id.clone(), pos);
                    entries.chunks.push(chunk.clone());
                }
            }
        }
        debug!(upserted = chunks.len(), total = entries.chunks.len(), "memory index upsert");
        Ok(chunks.len())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<Chunk>> {
        check_query(vector, self.dimension)?;
        let entries = self.read()?;

        let mut scored: Vec<(f32, &Chunk)> = entries
            .chunks
            .iter()
            .filter_map(|chunk| {
                chunk
                    .embedding()
                    .map(|embedding| (cosine_similarity(vector, embedding), chunk))
            })
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, chunk)| {
                let mut hit = chunk.without_embedding();
                hit.similarity_score = Some(score);
                hit
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read()?.chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded(id: &str, vector: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(id, format!("text of {}", id), "", "kb.md", 0);
        chunk.attach_embedding(vector).unwrap();
        chunk
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = MemoryIndex::new(2).unwrap();
        index
            .upsert(&[
                embedded("far", vec![0.0, 1.0]),
                embedded("near", vec![1.0, 0.1]),
                embedded("mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits.iter().all(|c| c.embedding().is_none()));
        assert!(hits[0].similarity_score.unwrap() > hits[1].similarity_score.unwrap());
    }

    #[tokio::test]
    async fn test_search_bounded_by_len_and_k() {
        let index = MemoryIndex::new(2).unwrap();
        assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());

        index
            .upsert(&[embedded("a", vec![1.0, 0.0]), embedded("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 5).await.unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 1).await.unwrap().len(), 1);
        assert!(index.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = MemoryIndex::new(2).unwrap();
        index.upsert(&[embedded("a", vec![1.0, 0.0])]).await.unwrap();
        index.upsert(&[embedded("a", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        let hits = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((hits[0].similarity_score.unwrap() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_dimension() {
        let index = MemoryIndex::new(2).unwrap();
        let bare = Chunk::new("bare", "t", "", "kb.md", 0);
        assert!(matches!(index.upsert(&[bare]).await, Err(BenchError::DataError(_))));

        let wide = embedded("wide", vec![1.0, 0.0, 0.0]);
        assert!(index.upsert(&[embedded("ok", vec![1.0, 0.0]), wide]).await.is_err());
        assert!(index.is_empty().await.unwrap());

        assert!(matches!(
            index.search(&[1.0], 1).await,
            Err(BenchError::DataError(_))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(MemoryIndex::new(0), Err(BenchError::ConfigError(_))));
    }
}
