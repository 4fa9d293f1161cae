// Structure-aware chunking of knowledge-base documents
//
// Components:
// - ChunkingConfig: validated window size/overlap
// - MarkdownChunker: header-delimited sections, sliding window over long bodies

pub mod markdown;

pub use markdown::{window_spans, MarkdownChunker, Section};

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};

/// Default window size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default overlap between consecutive windows
pub const DEFAULT_CHUNK_OVERLAP: usize = 128;

/// Window parameters for the chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    /// Create validated config. Requires `size > overlap >= 0`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(BenchError::ConfigError(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if overlap >= size {
            return Err(BenchError::ConfigError(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts
    pub fn step(&self) -> usize {
        self.size.saturating_sub(self.overlap)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
