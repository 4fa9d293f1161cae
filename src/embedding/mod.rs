// Embedding providers, durable cache and cache-first service
//
// Components:
// - EmbeddingProvider: texts -> vectors seam
// - OpenAiEmbeddings / LocalEmbeddings: HTTP and Candle backends
// - EmbeddingCache: append-only JSONL logs, one per role
// - EmbeddingService: cache-first single and batch embedding

pub mod cache;
pub mod local;
pub mod openai;
pub mod provider;
pub mod service;

pub use cache::EmbeddingCache;
pub use local::{LocalEmbeddings, DEFAULT_LOCAL_MODEL};
pub use openai::{
    OpenAiEmbeddings, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_URL,
};
pub use provider::EmbeddingProvider;
pub use service::{EmbeddingService, DEFAULT_BATCH_SIZE};
