// Qdrant-backed vector index
use anyhow::Context;
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        value::Kind, vectors_config::Config, with_payload_selector::SelectorOptions,
        CreateCollection, Distance, PointStruct, SearchPoints, Value as QdrantValue,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{check_query, checked_embedding, VectorIndex};
use crate::errors::{BenchError, Result};
use crate::types::Chunk;

/// Default Qdrant gRPC endpoint
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default collection name
pub const DEFAULT_COLLECTION: &str = "kb_chunks";

/// Stable numeric point id for a chunk id: first 8 bytes of BLAKE3, 63 bits
pub fn point_id(chunk_id: &str) -> u64 {
    let hash = blake3::hash(chunk_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes) & (u64::MAX >> 1)
}

/// Chunks stored as points of one Qdrant collection (cosine distance).
///
/// Point ids are hashed from chunk ids; ids seen by this process are
/// remembered so that two chunk ids hashing to the same point are reported
/// instead of silently overwriting each other.
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    dimension: usize,
    seen: Mutex<HashMap<u64, String>>,
}

impl QdrantIndex {
    /// Connect and make sure the collection exists.
    ///
    /// With `recreate`, an existing collection is dropped first so the run
    /// starts from an empty index.
    pub async fn connect(url: &str, collection: &str, dimension: usize, recreate: bool) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .context("Failed to create Qdrant client")
            .map_err(index_error)?;

        let index = Self {
            client,
            collection: collection.to_string(),
            dimension,
            seen: Mutex::new(HashMap::new()),
        };
        index.init_collection(recreate).await?;
        Ok(index)
    }

    async fn init_collection(&self, recreate: bool) -> Result<()> {
        let collections_list = self
            .client
            .list_collections()
            .await
            .context("Failed to list collections")
            .map_err(index_error)?;
        let mut exists = collections_list
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if exists && recreate {
            self.client
                .delete_collection(&self.collection)
                .await
                .context(format!("Failed to drop collection: {}", self.collection))
                .map_err(index_error)?;
            exists = false;
        }

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: self.dimension as u64,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .context(format!("Failed to create collection: {}", self.collection))
                .map_err(index_error)?;
            info!(collection = %self.collection, dimension = self.dimension, "created collection");
        }

        Ok(())
    }

    /// Record `chunk_id -> point` and reject a different chunk on the same point
    fn claim_ids(&self, chunks: &[Chunk]) -> Result<Vec<u64>> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| BenchError::IndexError("point id map lock poisoned".to_string()))?;

        let mut claimed = HashMap::new();
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = point_id(&chunk.chunk_id);
            let owner = seen.get(&id).or_else(|| claimed.get(&id));
            if let Some(owner) = owner {
                if *owner != chunk.chunk_id {
                    return Err(BenchError::DataError(format!(
                        "point id collision between {} and {}",
                        owner, chunk.chunk_id
                    )));
                }
            }
            claimed.insert(id, chunk.chunk_id.clone());
            ids.push(id);
        }
        seen.extend(claimed);
        Ok(ids)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            embeddings.push(checked_embedding(chunk, self.dimension)?.to_vec());
        }
        let ids = self.claim_ids(chunks)?;

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(ids)
            .zip(embeddings)
            .map(|((chunk, id), embedding)| PointStruct::new(id, embedding, chunk_payload(chunk)))
            .collect();

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .context("Failed to batch upsert points")
            .map_err(index_error)?;

        debug!(collection = %self.collection, upserted = chunks.len(), "qdrant upsert");
        Ok(chunks.len())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<Chunk>> {
        check_query(vector, self.dimension)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: top_k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .context("Failed to search points")
            .map_err(index_error)?;

        search_result
            .result
            .into_iter()
            .map(|point| {
                let mut chunk = chunk_from_payload(&point.payload)?;
                chunk.similarity_score = Some(point.score);
                Ok(chunk)
            })
            .collect()
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .context("Failed to get collection info")
            .map_err(index_error)?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }
}

fn index_error(err: anyhow::Error) -> BenchError {
    BenchError::IndexError(format!("{:#}", err))
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert("chunk_id".to_string(), QdrantValue::from(chunk.chunk_id.clone()));
    payload.insert("text".to_string(), QdrantValue::from(chunk.text.clone()));
    payload.insert(
        "section_header".to_string(),
        QdrantValue::from(chunk.section_header.clone()),
    );
    payload.insert(
        "source_filename".to_string(),
        QdrantValue::from(chunk.source_filename.clone()),
    );
    payload.insert(
        "sequence_index".to_string(),
        QdrantValue::from(chunk.sequence_index as i64),
    );
    payload
}

fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> Result<Chunk> {
    let string = |key: &str| -> Result<String> {
        match payload.get(key).and_then(|v| v.kind.as_ref()) {
            Some(Kind::StringValue(s)) => Ok(s.clone()),
            _ => Err(BenchError::DataError(format!("point payload missing '{}'", key))),
        }
    };
    let sequence_index = match payload.get("sequence_index").and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i as usize,
        _ => 0,
    };

    Ok(Chunk::new(
        string("chunk_id")?,
        string("text")?,
        string("section_header").unwrap_or_default(),
        string("source_filename").unwrap_or_default(),
        sequence_index,
    ))
}
