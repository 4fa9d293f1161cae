// Retrieval-augmented generation stages
//
// Components:
// - Retrieval Engine: query embedding, dense search, optional rerank
// - Re-ranking: relevance scorer seam and cross-encoder backend
// - Context Builder: numbered source context and user prompt

pub mod context;
pub mod reranking;
pub mod retrieval;

// Re-export key types
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use reranking::{ReRanker, RelevanceScorer};
pub use retrieval::{IndexReport, RetrievalEngine, SearchParams};
