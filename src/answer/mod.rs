//! Answer generation
//!
//! The runner talks to a language model only through [`AnswerGenerator`].
//! A request carries the configuration, so a generator knows whether the
//! reply must include reasoning steps.

pub mod chat;
pub mod parser;
pub mod prompts;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::Configuration;

pub use chat::{ChatCompletionsClient, DEFAULT_CHAT_MODEL, DEFAULT_CHAT_URL};
pub use parser::parse_answer;
pub use prompts::system_prompt;

/// One prompt for the answer model
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub configuration: Configuration,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl AnswerRequest {
    /// Request with the standard system prompt for `configuration`
    pub fn new(configuration: Configuration, user_prompt: impl Into<String>) -> Self {
        Self {
            configuration,
            system_prompt: system_prompt(configuration).to_string(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Model reply after parsing
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    /// Present for the reasoning configuration
    pub reasoning_steps: Option<String>,
}

/// Produces an answer for a prompt
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Model name recorded with each result
    fn model_id(&self) -> &str;

    async fn generate(&self, request: &AnswerRequest) -> Result<GeneratedAnswer>;
}
