// Cross-encoder relevance scorer via Candle
use anyhow::Context;
use async_trait::async_trait;
use candle_nn::{Linear, Module};
use std::sync::Arc;

use super::RelevanceScorer;
use crate::errors::{BenchError, Result};
use crate::models::bert::{self, BertAssets};

/// Default reranking model
pub const DEFAULT_RERANK_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

struct CrossEncoder {
    assets: BertAssets,
    pooler: Linear,
    classifier: Linear,
}

/// BERT sequence-classification head over `[CLS] query [SEP] passage [SEP]`
#[derive(Clone)]
pub struct CrossEncoderScorer {
    inner: Arc<CrossEncoder>,
    model_id: String,
}

impl CrossEncoderScorer {
    /// Load model (downloads on first use). Blocking.
    pub fn load(model_id: &str) -> Result<Self> {
        let load = || -> anyhow::Result<CrossEncoder> {
            let assets = bert::load(model_id)?;
            let hidden = assets.hidden_size;
            let pooler = candle_nn::linear(hidden, hidden, assets.vars.pp("bert.pooler.dense"))
                .context("Failed to load pooler weights")?;
            let classifier = candle_nn::linear(hidden, 1, assets.vars.pp("classifier"))
                .context("Failed to load classifier weights")?;
            Ok(CrossEncoder {
                assets,
                pooler,
                classifier,
            })
        };

        let inner = load().map_err(|e| {
            BenchError::ConfigError(format!("Failed to load rerank model {}: {:#}", model_id, e))
        })?;

        Ok(Self {
            inner: Arc::new(inner),
            model_id: model_id.to_string(),
        })
    }
}

impl CrossEncoder {
    fn score_blocking(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
        let pairs: Vec<(String, String)> = texts
            .iter()
            .map(|text| (query.to_string(), text.clone()))
            .collect();

        let batch = self.assets.encode(pairs)?;
        let hidden = self.assets.forward(&batch)?;

        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;

        Ok(logits.to_vec1::<f32>()?)
    }
}

#[async_trait]
impl RelevanceScorer for CrossEncoderScorer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.score_blocking(&query, &texts))
            .await
            .map_err(|e| BenchError::RerankError(format!("rerank task failed: {}", e)))?
            .map_err(|e| BenchError::RerankError(format!("{:#}", e)))
    }
}
