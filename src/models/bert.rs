// Local BERT-family models via Candle: download, tokenize, pool
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{EncodeInput, Tokenizer, TruncationParams};
use tracing::info;

/// Longest input the position embeddings of these models accept
const MAX_SEQUENCE_LEN: usize = 512;

/// Weights, tokenizer and the raw var builder of a downloaded BERT model.
///
/// The var builder is kept so callers can load extra heads (pooler,
/// classifier) from the same safetensors file.
pub struct BertAssets {
    pub model: BertModel,
    pub tokenizer: Tokenizer,
    pub vars: VarBuilder<'static>,
    pub hidden_size: usize,
    pub device: Device,
}

/// Token tensors for one padded batch
pub struct EncodedBatch {
    pub token_ids: Tensor,
    pub type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Download (first use) and load a BERT model from the HuggingFace Hub
pub fn load(model_id: &str) -> Result<BertAssets> {
    let device = Device::Cpu;

    let api = Api::new().context("Failed to create HuggingFace API client")?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    let config_path = repo.get("config.json").context("Failed to download model config")?;
    let tokenizer_path = repo.get("tokenizer.json").context("Failed to download tokenizer")?;
    let weights_path = repo
        .get("model.safetensors")
        .context("Failed to download model weights")?;

    let config_contents =
        std::fs::read_to_string(config_path).context("Failed to read config file")?;
    let config: Config =
        serde_json::from_str(&config_contents).context("Failed to parse model config")?;
    let raw_config: serde_json::Value =
        serde_json::from_str(&config_contents).context("Failed to parse model config")?;
    let hidden_size = raw_config
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .context("Model config has no hidden_size")? as usize;

    let mut tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LEN,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

    let vars = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .context("Failed to load model weights")?
    };

    let model = BertModel::load(vars.clone(), &config).context("Failed to create BERT model")?;

    info!(model_id, hidden_size, "loaded BERT model");

    Ok(BertAssets {
        model,
        tokenizer,
        vars,
        hidden_size,
        device,
    })
}

impl BertAssets {
    /// Tokenize and right-pad a batch of single texts or text pairs
    pub fn encode<'s, E>(&self, inputs: Vec<E>) -> Result<EncodedBatch>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let batch_size = encodings.len();
        let max_len = encodings.iter().map(|enc| enc.get_ids().len()).max().unwrap_or(0);

        let mut ids = vec![0u32; batch_size * max_len];
        let mut type_ids = vec![0u32; batch_size * max_len];
        let mut mask = vec![0u32; batch_size * max_len];

        for (row, encoding) in encodings.iter().enumerate() {
            let offset = row * max_len;
            let len = encoding.get_ids().len();
            ids[offset..offset + len].copy_from_slice(encoding.get_ids());
            type_ids[offset..offset + len].copy_from_slice(encoding.get_type_ids());
            mask[offset..offset + len].copy_from_slice(encoding.get_attention_mask());
        }

        Ok(EncodedBatch {
            token_ids: Tensor::from_vec(ids, (batch_size, max_len), &self.device)?,
            type_ids: Tensor::from_vec(type_ids, (batch_size, max_len), &self.device)?,
            attention_mask: Tensor::from_vec(mask, (batch_size, max_len), &self.device)?,
        })
    }

    /// Last hidden states, shape (batch, seq, hidden)
    pub fn forward(&self, batch: &EncodedBatch) -> Result<Tensor> {
        let hidden = self.model.forward(
            &batch.token_ids,
            &batch.type_ids,
            Some(&batch.attention_mask),
        )?;
        Ok(hidden)
    }
}

/// Mean pooling with attention mask
pub fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask_expanded = attention_mask
        .unsqueeze(2)?
        .expand(embeddings.shape())?
        .to_dtype(embeddings.dtype())?;

    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
    let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

    Ok(sum_embeddings.broadcast_div(&sum_mask)?)
}

/// Scale each row to unit length
pub fn l2_normalize(embeddings: &Tensor) -> Result<Tensor> {
    let norms = embeddings
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-12, f64::MAX)?;
    Ok(embeddings.broadcast_div(&norms)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        // one row, three positions, last one padded
        let embeddings =
            Tensor::from_vec(vec![1f32, 1.0, 3.0, 3.0, 100.0, 100.0], (1, 3, 2), &device).unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 0], (1, 3), &device).unwrap();

        let pooled = mean_pool(&embeddings, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 2.0]]);
    }

    #[test]
    fn test_l2_normalize_rows() {
        let device = Device::Cpu;
        let rows = Tensor::from_vec(vec![3f32, 4.0, 0.0, 2.0], (2, 2), &device).unwrap();
        let normed = l2_normalize(&rows).unwrap().to_vec2::<f32>().unwrap();
        assert!((normed[0][0] - 0.6).abs() < 1e-6);
        assert!((normed[0][1] - 0.8).abs() < 1e-6);
        assert!((normed[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_load_minilm() {
        let assets = load("sentence-transformers/all-MiniLM-L6-v2").expect("Failed to load model");
        assert_eq!(assets.hidden_size, 384);
    }
}
