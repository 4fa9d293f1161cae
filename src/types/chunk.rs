//! Documents, chunks and cache roles

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::{BenchError, Result};

/// A knowledge-base document, loaded once per corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub raw_text: String,
}

impl Document {
    /// Create new document
    pub fn new(filename: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Which cache partition an embedding belongs to.
///
/// Some providers embed passages and queries asymmetrically, so the same
/// text may map to different vectors per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    Chunk,
    Query,
}

impl CacheRole {
    pub const ALL: [CacheRole; 2] = [CacheRole::Chunk, CacheRole::Query];

    /// File name of this role's append-only log
    pub fn file_name(&self) -> &'static str {
        match self {
            CacheRole::Chunk => "embeddings_chunks.jsonl",
            CacheRole::Query => "embeddings_queries.jsonl",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRole::Chunk => "chunk",
            CacheRole::Query => "query",
        }
    }
}

/// A contiguous span of a document's section, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `filename#chunk_{section}` or `filename#chunk_{section}_{sub}`
    pub chunk_id: String,
    pub text: String,
    pub section_header: String,
    pub source_filename: String,
    /// Ordinal of this chunk within its document
    pub sequence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Chunk {
    /// Create new chunk without embedding or scores
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        section_header: impl Into<String>,
        source_filename: impl Into<String>,
        sequence_index: usize,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            section_header: section_header.into(),
            source_filename: source_filename.into(),
            sequence_index,
            embedding: None,
            similarity_score: None,
            rerank_score: None,
        }
    }

    /// Attached embedding, if any
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Attach the embedding. A chunk is embedded exactly once.
    pub fn attach_embedding(&mut self, embedding: Vec<f32>) -> Result<()> {
        if self.embedding.is_some() {
            return Err(BenchError::DataError(format!(
                "chunk {} already has an embedding",
                self.chunk_id
            )));
        }
        if embedding.is_empty() {
            return Err(BenchError::DataError(format!(
                "empty embedding for chunk {}",
                self.chunk_id
            )));
        }
        self.embedding = Some(embedding);
        Ok(())
    }

    /// Copy of this chunk with the vector dropped, as handed out by searches
    pub fn without_embedding(&self) -> Self {
        Self {
            embedding: None,
            ..self.clone()
        }
    }

    /// Score used for ordering: rerank score when present, else similarity
    pub fn effective_score(&self) -> f32 {
        self.rerank_score
            .or(self.similarity_score)
            .unwrap_or(0.0)
    }

    /// Payload fields recorded next to the chunk in ledgers and indexes
    pub fn metadata(&self) -> Map<String, Value> {
        let value = json!({
            "filename": self.source_filename,
            "section": self.section_header,
            "sequence_index": self.sequence_index,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
