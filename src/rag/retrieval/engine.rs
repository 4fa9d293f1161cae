// Two-stage retrieval: dense search, then optional reranking
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::embedding::EmbeddingService;
use crate::errors::{BenchError, Result};
use crate::index::VectorIndex;
use crate::rag::reranking::ReRanker;
use crate::types::{CacheRole, Chunk, Configuration};

/// Default number of chunks handed to the answer generator
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of first-stage candidates for reranking
pub const DEFAULT_TOP_N: usize = 20;

/// Search parameters for retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Chunks returned to the caller
    pub top_k: usize,
    /// Candidates fetched before reranking (ignored without a reranker)
    pub top_n: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(BenchError::ConfigError("top_k must be greater than 0".to_string()));
        }
        if self.top_n < self.top_k {
            return Err(BenchError::ConfigError(format!(
                "top_n ({}) must be at least top_k ({})",
                self.top_n, self.top_k
            )));
        }
        Ok(())
    }
}

/// Outcome of indexing the chunked corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Chunks written to the index by this call
    pub indexed: usize,
    /// Index already held vectors, nothing was embedded
    pub skipped: bool,
}

/// Retrieval engine for semantic search
pub struct RetrievalEngine {
    embeddings: Arc<EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<ReRanker>,
    default_params: SearchParams,
}

impl RetrievalEngine {
    /// Create new retrieval engine.
    ///
    /// The index must hold vectors of the embedding provider's dimension.
    pub fn new(embeddings: Arc<EmbeddingService>, index: Arc<dyn VectorIndex>) -> Result<Self> {
        let provider_dim = embeddings.dimension();
        if provider_dim != index.dimension() {
            return Err(BenchError::ConfigError(format!(
                "embedding dimension {} does not match index dimension {}",
                provider_dim,
                index.dimension()
            )));
        }

        Ok(Self {
            embeddings,
            index,
            reranker: None,
            default_params: SearchParams::default(),
        })
    }

    /// Attach a second-stage reranker
    pub fn with_reranker(mut self, reranker: ReRanker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Create with custom default parameters
    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn default_params(&self) -> SearchParams {
        self.default_params
    }

    /// Embed and upsert chunks unless the index already holds vectors
    pub async fn index_chunks(&self, mut chunks: Vec<Chunk>, batch_size: usize) -> Result<IndexReport> {
        if !self.index.is_empty().await? {
            info!(points = self.index.len().await?, "index already populated, skipping");
            return Ok(IndexReport {
                indexed: 0,
                skipped: true,
            });
        }

        self.embeddings.embed_chunks(&mut chunks, batch_size).await?;

        let mut indexed = 0;
        for batch in chunks.chunks(batch_size.max(1)) {
            indexed += self.index.upsert(batch).await?;
        }
        info!(indexed, "indexed corpus");

        Ok(IndexReport {
            indexed,
            skipped: false,
        })
    }

    /// First stage only: nearest `top_k` chunks to the query
    pub async fn dense(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        let vector = self.embeddings.embed_one(query, CacheRole::Query).await?;
        self.index.search(&vector, top_k).await
    }

    /// Retrieve with default parameters
    pub async fn retrieve(&self, query: &str, configuration: Configuration) -> Result<Vec<Chunk>> {
        self.retrieve_with_params(query, configuration, self.default_params)
            .await
    }

    /// Retrieve the chunks `configuration` calls for.
    ///
    /// No-retrieval returns nothing; plain retrieval returns the `top_k`
    /// nearest; rerank configurations fetch `top_n` and keep the best
    /// `top_k` by rerank score.
    pub async fn retrieve_with_params(
        &self,
        query: &str,
        configuration: Configuration,
        params: SearchParams,
    ) -> Result<Vec<Chunk>> {
        if !configuration.uses_retrieval() {
            return Ok(Vec::new());
        }

        if !configuration.uses_rerank() {
            let chunks = self.dense(query, params.top_k).await?;
            debug!(retrieved = chunks.len(), "dense retrieval");
            return Ok(chunks);
        }

        let reranker = self
            .reranker
            .as_ref()
            .ok_or_else(|| BenchError::NotConfigured(format!("reranker for {}", configuration)))?;

        let candidates = self.dense(query, params.top_n.max(params.top_k)).await?;
        debug!(candidates = candidates.len(), "first-stage candidates");
        reranker.rerank(query, candidates, params.top_k).await
    }
}
