// Retrieval engine module
pub mod engine;

pub use engine::{IndexReport, RetrievalEngine, SearchParams, DEFAULT_TOP_K, DEFAULT_TOP_N};
