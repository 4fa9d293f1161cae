//! Type definitions module
//!
//! Data model shared by the chunker, indexes, runner and ledger.

pub mod chunk;
pub mod record;

// Re-export commonly used types
pub use chunk::{CacheRole, Chunk, Document};
pub use record::{Configuration, ExperimentResult, QueryRecord, RetrievedChunk};
