//! Local model support
//!
//! Candle-backed BERT loading shared by the local embedding backend and the
//! cross-encoder reranker.

pub mod bert;

pub use bert::{BertAssets, EncodedBatch};
