//! OpenAI-compatible embeddings client
//!
//! `POST {base_url}/embeddings` with bearer auth. Transient failures
//! (429, 5xx, connection errors) go through the retry manager.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::EmbeddingProvider;
use crate::errors::{BenchError, Result};
use crate::retry::RetryManager;

/// Default API endpoint
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Dimension of the default model
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Request timeout (60 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embeddings over the OpenAI HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    retry: RetryManager,
}

impl OpenAiEmbeddings {
    /// Create client for the default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(
            DEFAULT_OPENAI_URL,
            api_key,
            DEFAULT_EMBEDDING_MODEL,
            DEFAULT_EMBEDDING_DIM,
            RetryManager::new(),
        )
    }

    /// Create client with custom configuration
    pub fn with_config(
        base_url: &str,
        api_key: impl Into<String>,
        model: &str,
        dimension: usize,
        retry: RetryManager,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BenchError::ConfigError(
                "embedding API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BenchError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            dimension,
            retry,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, error_text));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| BenchError::MalformedResponse(format!("embedding response: {}", e)))?;

        order_by_index(body.data, texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");
        self.retry.execute_with_retry(|| self.request(texts)).await
    }
}

/// 429 and 5xx are worth retrying; other failures are permanent
fn classify_status(status: StatusCode, body: String) -> BenchError {
    let message = format!("HTTP {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BenchError::ApiError(message)
    } else {
        BenchError::EmbeddingError(message)
    }
}

/// The API may return entries out of order; `index` is authoritative
fn order_by_index(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(BenchError::MalformedResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(BenchError::MalformedResponse(format!(
                    "unexpected embedding index {}",
                    item.index
                )))
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
