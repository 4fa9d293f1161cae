// Local sentence embeddings via Candle (offline runs)
use async_trait::async_trait;
use std::sync::Arc;

use super::EmbeddingProvider;
use crate::errors::{BenchError, Result};
use crate::models::bert::{self, BertAssets};

/// Default local embedding model
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Mean-pooled, L2-normalised BERT embeddings computed on CPU
pub struct LocalEmbeddings {
    assets: Arc<BertAssets>,
    model_id: String,
}

impl LocalEmbeddings {
    /// Load model (downloads on first use). Blocking.
    pub fn load(model_id: &str) -> Result<Self> {
        let assets = bert::load(model_id).map_err(|e| {
            BenchError::ConfigError(format!("Failed to load embedding model {}: {:#}", model_id, e))
        })?;
        Ok(Self {
            assets: Arc::new(assets),
            model_id: model_id.to_string(),
        })
    }

    fn embed_blocking(assets: &BertAssets, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        let batch = assets.encode(texts)?;
        let hidden = assets.forward(&batch)?;
        let pooled = bert::mean_pool(&hidden, &batch.attention_mask)?;
        let normed = bert::l2_normalize(&pooled)?;
        Ok(normed.to_vec2::<f32>()?)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.assets.hidden_size
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let assets = Arc::clone(&self.assets);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || Self::embed_blocking(&assets, texts))
            .await
            .map_err(|e| BenchError::EmbeddingError(format!("embedding task failed: {}", e)))?
            .map_err(|e| BenchError::EmbeddingError(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_local_embedding_dimension_and_norm() {
        let provider = LocalEmbeddings::load(DEFAULT_LOCAL_MODEL).expect("Failed to load model");
        let vectors = provider
            .embed(&["Where is my parcel?".to_string(), "Refund window".to_string()])
            .await
            .expect("Failed to embed");

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == provider.dimension()));
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
