// OpenAI-compatible chat completions client (OpenRouter by default)
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{parse_answer, AnswerGenerator, AnswerRequest, GeneratedAnswer};
use crate::errors::{BenchError, Result};
use crate::retry::RetryManager;
use crate::types::Configuration;

/// Default chat completions endpoint
pub const DEFAULT_CHAT_URL: &str = "https://openrouter.ai/api/v1";

/// Default answer model
pub const DEFAULT_CHAT_MODEL: &str = "amazon/nova-2-lite-v1:free";

/// Attempts for the no-retrieval configuration
pub const BASELINE_ATTEMPTS: u32 = 2;

/// Request timeout (120 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Answer generator over `POST {base_url}/chat/completions`
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    base_delay_ms: u64,
}

impl ChatCompletionsClient {
    /// Create client for the default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(DEFAULT_CHAT_URL, api_key, DEFAULT_CHAT_MODEL)
    }

    /// Create client with custom configuration
    pub fn with_config(base_url: &str, api_key: impl Into<String>, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BenchError::ConfigError("answer API key is empty".to_string()));
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
            temperature: 0.0,
            max_retries: crate::retry::MAX_RETRIES,
            base_delay_ms: 1000,
        })
    }

    /// Retry budget for retrieval configurations and backoff base
    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BenchError::HttpError)?;
        Ok(self)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Baseline queries get a smaller budget than retrieval ones
    fn retry_for(&self, configuration: Configuration) -> RetryManager {
        let attempts = match configuration {
            Configuration::NoRetrieval => self.max_retries.min(BASELINE_ATTEMPTS),
            _ => self.max_retries,
        };
        RetryManager::with_config(attempts, self.base_delay_ms)
    }

    async fn request(&self, request: &AnswerRequest) -> Result<GeneratedAnswer> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "ragbench")
            .json(&body)
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

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| BenchError::MalformedResponse(format!("chat response: {}", e)))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BenchError::MalformedResponse("chat response has no content".to_string()))?;

        parse_answer(request.configuration, &content)
    }
}

#[async_trait]
impl AnswerGenerator for ChatCompletionsClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &AnswerRequest) -> Result<GeneratedAnswer> {
        debug!(
            model = %self.model,
            configuration = %request.configuration,
            prompt_chars = request.user_prompt.len(),
            "requesting answer"
        );
        self.retry_for(request.configuration)
            .execute_with_retry(|| self.request(request))
            .await
    }
}

/// 429 and 5xx are worth retrying; other failures are permanent
fn classify_status(status: StatusCode, body: String) -> BenchError {
    let message = format!("HTTP {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BenchError::ApiError(message)
    } else {
        BenchError::AnswerError(message)
    }
}
