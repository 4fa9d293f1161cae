// Reranking: relevance scorer seam, reranker, cross-encoder backend
pub mod cross_encoder;
pub mod scorer;

pub use cross_encoder::{CrossEncoderScorer, DEFAULT_RERANK_MODEL};
pub use scorer::{ReRanker, RelevanceScorer};
