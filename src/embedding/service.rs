// Cache-first embedding service
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{EmbeddingCache, EmbeddingProvider};
use crate::errors::{BenchError, Result};
use crate::types::{CacheRole, Chunk};

/// Default number of texts per provider call
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Embeds texts through the cache, calling the provider only on misses.
///
/// Fresh vectors are appended to the cache as soon as their batch returns,
/// so an interrupted bulk run keeps everything it already paid for.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<EmbeddingCache>,
}

impl EmbeddingService {
    /// Create new embedding service
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Provider vector length
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    fn cache(&self) -> Result<MutexGuard<'_, EmbeddingCache>> {
        self.cache
            .lock()
            .map_err(|_| BenchError::Generic("embedding cache lock poisoned".to_string()))
    }

    /// Number of cached entries for a role
    pub fn cached(&self, role: CacheRole) -> Result<usize> {
        Ok(self.cache()?.len(role))
    }

    /// Embed one text. Cache hits make no provider call.
    pub async fn embed_one(&self, text: &str, role: CacheRole) -> Result<Vec<f32>> {
        let cached = self.cache()?.get(role, text).map(|v| v.to_vec());
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let mut vectors = self.provider.embed(&[text.to_string()]).await?;
        let vector = match (vectors.pop(), vectors.is_empty()) {
            (Some(vector), true) => vector,
            _ => {
                return Err(BenchError::MalformedResponse(
                    "provider did not return exactly one vector".to_string(),
                ))
            }
        };
        self.check_dimension(&vector)?;

        self.cache()?.insert(role, text, vector.clone())?;
        Ok(vector)
    }

    /// Embed many texts, preserving input order.
    ///
    /// Uncached texts are deduplicated and sent in batches of `batch_size`.
    pub async fn embed_many(
        &self,
        texts: &[String],
        role: CacheRole,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if batch_size == 0 {
            return Err(BenchError::ConfigError(
                "embedding batch_size must be greater than 0".to_string(),
            ));
        }

        let missing: Vec<String> = {
            let cache = self.cache()?;
            let mut seen = HashSet::new();
            texts
                .iter()
                .filter(|text| !cache.contains(role, text))
                .filter(|text| seen.insert(text.as_str()))
                .cloned()
                .collect()
        };

        debug!(
            role = role.as_str(),
            total = texts.len(),
            missing = missing.len(),
            "embedding batch"
        );

        for batch in missing.chunks(batch_size) {
            let vectors = self.provider.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(BenchError::MalformedResponse(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in &vectors {
                self.check_dimension(vector)?;
            }

            let mut cache = self.cache()?;
            for (text, vector) in batch.iter().zip(vectors) {
                cache.insert(role, text, vector)?;
            }
        }

        let cache = self.cache()?;
        let mut resolved: HashMap<&str, &[f32]> = HashMap::new();
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let vector = match resolved.get(text.as_str()) {
                Some(vector) => *vector,
                None => {
                    let vector = cache.get(role, text).ok_or_else(|| {
                        BenchError::Generic(format!("embedding for '{}' missing after batch", text))
                    })?;
                    resolved.insert(text.as_str(), vector);
                    vector
                }
            };
            out.push(vector.to_vec());
        }
        Ok(out)
    }

    /// Embed chunks (role `chunk`) and attach the vectors
    pub async fn embed_chunks(&self, chunks: &mut [Chunk], batch_size: usize) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_many(&texts, CacheRole::Chunk, batch_size).await?;
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.attach_embedding(vector)?;
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.provider.dimension();
        if vector.is_empty() || (expected > 0 && vector.len() != expected) {
            return Err(BenchError::DataError(format!(
                "embedding has dimension {}, expected {}",
                vector.len(),
                expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quickcheck_macros::quickcheck;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Deterministic provider that records every batch it receives
    struct RecordingProvider {
        calls: AtomicUsize,
        batches: Mutex<Vec<Vec<String>>>,
        dimension: usize,
        fail: bool,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                dimension: 3,
                fail: false,
            }
        }

        fn vector_for(text: &str) -> Vec<f32> {
            let sum: u32 = text.bytes().map(u32::from).sum();
            vec![text.len() as f32, sum as f32, 1.0]
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn model_id(&self) -> &str {
            "recording"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(texts.to_vec());
            if self.fail {
                return Err(BenchError::EmbeddingError("provider down".to_string()));
            }
            Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
        }
    }

    fn service_in(dir: &TempDir, provider: Arc<RecordingProvider>) -> EmbeddingService {
        EmbeddingService::new(provider, EmbeddingCache::open(dir.path()).unwrap())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_same_text_same_role_calls_once() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider::new());
        let service = service_in(&dir, provider.clone());

        let first = service.embed_one("return policy", CacheRole::Query).await.unwrap();
        let second = service.embed_one("return policy", CacheRole::Query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_roles_are_cached_separately() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider::new());
        let service = service_in(&dir, provider.clone());

        service.embed_one("store hours", CacheRole::Chunk).await.unwrap();
        service.embed_one("store hours", CacheRole::Query).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.cached(CacheRole::Chunk).unwrap(), 1);
        assert_eq!(service.cached(CacheRole::Query).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embed_many_preserves_order_around_cached_items() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider::new());
        let service = service_in(&dir, provider.clone());

        service.embed_one("B", CacheRole::Chunk).await.unwrap();
        let out = service
            .embed_many(&strings(&["A", "B", "C"]), CacheRole::Chunk, 10)
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![
                RecordingProvider::vector_for("A"),
                RecordingProvider::vector_for("B"),
                RecordingProvider::vector_for("C"),
            ]
        );
        let batches = provider.batches.lock().unwrap();
        assert_eq!(batches.last().unwrap(), &strings(&["A", "C"]));
    }

    #[tokio::test]
    async fn test_embed_many_dedups_and_batches() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider::new());
        let service = service_in(&dir, provider.clone());

        let texts = strings(&["a", "b", "a", "c", "d", "e", "b"]);
        let out = service.embed_many(&texts, CacheRole::Chunk, 2).await.unwrap();

        assert_eq!(out.len(), 7);
        assert_eq!(out[0], out[2]);
        let batches = provider.batches.lock().unwrap().clone();
        assert_eq!(
            batches,
            vec![strings(&["a", "b"]), strings(&["c", "d"]), strings(&["e"])]
        );
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let dir = TempDir::new().unwrap();
        let texts = strings(&["one", "two"]);
        {
            let service = service_in(&dir, Arc::new(RecordingProvider::new()));
            service.embed_many(&texts, CacheRole::Chunk, 100).await.unwrap();
        }

        let provider = Arc::new(RecordingProvider::new());
        let service = service_in(&dir, provider.clone());
        service.embed_many(&texts, CacheRole::Chunk, 100).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_propagates_and_caches_nothing() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..RecordingProvider::new()
        });
        let service = service_in(&dir, provider);

        let err = service.embed_one("x", CacheRole::Query).await.unwrap_err();
        assert!(matches!(err, BenchError::EmbeddingError(_)));
        assert_eq!(service.cached(CacheRole::Query).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_not_cached() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(RecordingProvider {
            dimension: 8,
            ..RecordingProvider::new()
        });
        let service = service_in(&dir, provider);

        let err = service.embed_one("x", CacheRole::Chunk).await.unwrap_err();
        assert!(matches!(err, BenchError::DataError(_)));
        assert_eq!(service.cached(CacheRole::Chunk).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, Arc::new(RecordingProvider::new()));
        let err = service
            .embed_many(&strings(&["a"]), CacheRole::Chunk, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_embed_chunks_attaches_vectors() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, Arc::new(RecordingProvider::new()));
        let mut chunks = vec![
            Chunk::new("a.md#chunk_0", "alpha", "", "a.md", 0),
            Chunk::new("a.md#chunk_1", "beta", "", "a.md", 1),
        ];
        service.embed_chunks(&mut chunks, 10).await.unwrap();
        assert_eq!(chunks[1].embedding().unwrap(), &RecordingProvider::vector_for("beta")[..]);
    }

    #[quickcheck]
    fn prop_embed_many_matches_per_text_vectors(picks: Vec<u8>, precached: Vec<u8>) -> bool {
        const WORDS: [&str; 6] = ["ship", "return", "refund", "hours", "gift", "size"];
        let texts: Vec<String> = picks.iter().map(|p| WORDS[*p as usize % 6].to_string()).collect();

        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, Arc::new(RecordingProvider::new()));

        tokio_test::block_on(async {
            for p in &precached {
                service
                    .embed_one(WORDS[*p as usize % 6], CacheRole::Chunk)
                    .await
                    .unwrap();
            }
            let out = service.embed_many(&texts, CacheRole::Chunk, 4).await.unwrap();
            out.len() == texts.len()
                && out
                    .iter()
                    .zip(&texts)
                    .all(|(v, t)| *v == RecordingProvider::vector_for(t))
        })
    }
}
