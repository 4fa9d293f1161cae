//! Provider doubles and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragbench::{
    answer::{AnswerGenerator, AnswerRequest, GeneratedAnswer},
    embedding::{EmbeddingCache, EmbeddingProvider, EmbeddingService},
    index::MemoryIndex,
    rag::{reranking::RelevanceScorer, ReRanker, RetrievalEngine, SearchParams},
    BenchError, Result,
};

pub const DIM: usize = 4;

/// Deterministic embedder that counts provider calls and texts
#[derive(Default)]
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        lower.matches("return").count() as f32,
        lower.matches("ship").count() as f32,
        lower.matches("warranty").count() as f32,
        1.0,
    ]
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model_id(&self) -> &str {
        "counting"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Scores passages by how often they mention the first query word;
/// queries containing `fail_on` fail
pub struct KeywordScorer {
    pub fail_on: Option<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl RelevanceScorer for KeywordScorer {
    fn model_id(&self) -> &str {
        "keyword"
    }

    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if query.contains(marker.as_str()) {
                return Err(BenchError::RerankError("model crashed".to_string()));
            }
        }
        let keyword = query.split_whitespace().next().unwrap_or("").to_lowercase();
        Ok(texts
            .iter()
            .map(|t| t.to_lowercase().matches(&keyword).count() as f32)
            .collect())
    }
}

/// Answers every prompt; prompts containing `fail_marker` fail
pub struct FlakyGenerator {
    pub fail_marker: Option<String>,
    pub calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn reliable() -> Self {
        Self {
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for FlakyGenerator {
    fn model_id(&self) -> &str {
        "flaky"
    }

    async fn generate(&self, request: &AnswerRequest) -> Result<GeneratedAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if request.user_prompt.contains(marker.as_str()) {
                return Err(BenchError::RetriesExhausted {
                    attempts: 5,
                    last: "Remote API error: HTTP 503".to_string(),
                });
            }
        }
        Ok(GeneratedAnswer {
            answer: "According to [Source 1], yes.".to_string(),
            reasoning_steps: request
                .configuration
                .expects_reasoning()
                .then(|| "Step 1: read [Source 1]".to_string()),
        })
    }
}

/// Small retail knowledge base on disk
pub fn write_kb(dir: &Path, queries: usize) {
    std::fs::write(
        dir.join("returns.md"),
        "# Returns\n\n## Window\n\nItems can be returned within 30 days. Returns need a receipt.\n\n## Refunds\n\nRefunds for returns post in 5 days.\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("shipping.md"),
        "# Shipping\n\nWe ship to 40 countries. Express shipping takes 2 days.\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("warranty.md"),
        "# Warranty\n\nElectronics carry a one year warranty.\n",
    )
    .unwrap();
    std::fs::write(dir.join("README.md"), "# Not part of the corpus\n").unwrap();

    let lines: Vec<String> = (1..=queries)
        .map(|i| {
            serde_json::json!({
                "query_id": format!("q{:03}", i),
                "query": format!("return policy question {}", i),
                "ground_truth": "30 days",
                "difficulty": "easy",
            })
            .to_string()
        })
        .collect();
    std::fs::write(dir.join("queries.jsonl"), lines.join("\n")).unwrap();
}

/// Retrieval engine over a memory index with keyword reranking
pub fn engine(cache_dir: &Path, embedder: Arc<CountingEmbedder>) -> RetrievalEngine {
    engine_with_rerank_failure(cache_dir, embedder, None)
}

/// As `engine`, with reranking failing for queries containing `fail_on`
pub fn engine_with_rerank_failure(
    cache_dir: &Path,
    embedder: Arc<CountingEmbedder>,
    fail_on: Option<&str>,
) -> RetrievalEngine {
    let cache = EmbeddingCache::open(cache_dir).unwrap();
    let service = Arc::new(EmbeddingService::new(embedder, cache));
    let index = Arc::new(MemoryIndex::new(DIM).unwrap());
    RetrievalEngine::new(service, index)
        .unwrap()
        .with_reranker(ReRanker::new(Arc::new(KeywordScorer {
            fail_on: fail_on.map(str::to_string),
            calls: AtomicUsize::new(0),
        })))
        .with_params(SearchParams { top_k: 2, top_n: 4 })
}
