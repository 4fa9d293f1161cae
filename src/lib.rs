//! ragbench - Retrieval-augmented generation experiment runner
//!
//! Runs four answer configurations over a markdown knowledge base and a
//! query set, recording one result line per `(query, configuration)`:
//!
//! - **E1**: no retrieval (baseline)
//! - **E2**: dense retrieval, top-K chunks as cited context
//! - **E3**: dense top-N, cross-encoder rerank to top-K
//! - **E4**: as E3, answer with explicit reasoning steps
//!
//! # Architecture
//!
//! - `chunking`, `corpus`: documents to header-aware chunks
//! - `embedding`: providers behind a durable, role-partitioned cache
//! - `index`: vector index seam (in-memory, Qdrant)
//! - `rag`: retrieval engine, reranking, context assembly
//! - `answer`: answer generator seam and chat-completions backend
//! - `runner`, `ledger`, `validate`: resumable run loop and its output

// Core data model and errors
pub mod errors;
pub mod types;

// Re-export commonly used types
pub use errors::{BenchError, Result};

// Corpus preparation
pub mod chunking;
pub mod corpus;

// Providers
pub mod embedding;
pub mod index;
pub mod models;
pub mod retry;

// Retrieval and answering
pub mod answer;
pub mod rag;

// Run loop and results
pub mod ledger;
pub mod runner;
pub mod validate;

// Binary support
pub mod cli;
pub mod logging;
