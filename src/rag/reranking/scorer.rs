// Second-stage reranking of retrieved chunks
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{BenchError, Result};
use crate::types::Chunk;

/// Scores `(query, passage)` pairs for relevance.
///
/// Scores are on the model's own scale and only comparable with each
/// other, not with first-stage similarities.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// One score per text, in input order
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

/// Re-ranker for improving retrieval results
#[derive(Clone)]
pub struct ReRanker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl ReRanker {
    /// Create new re-ranker over a relevance scorer
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    pub fn model_id(&self) -> &str {
        self.scorer.model_id()
    }

    /// Re-score candidates and keep the best `top_k`.
    ///
    /// `rerank_score` is set on each kept chunk; `similarity_score` is left
    /// as retrieved. NaN scores become `f32::MIN` and sort last.
    pub async fn rerank(&self, query: &str, candidates: Vec<Chunk>, top_k: usize) -> Result<Vec<Chunk>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.scorer.score(query, &texts).await?;
        if scores.len() != candidates.len() {
            return Err(BenchError::RerankError(format!(
                "scorer returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        let mut ranked: Vec<Chunk> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut chunk, score)| {
                chunk.rerank_score = Some(if score.is_nan() { f32::MIN } else { score });
                chunk
            })
            .collect();

        // Sort by rerank score descending; stable for ties
        ranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(top_k);

        debug!(kept = ranked.len(), top_k, "reranked candidates");
        Ok(ranked)
    }
}
