//! Configuration management for ragbench
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.ragbench/config.toml (or `--config`), then environment
//! overrides (`KB_DIR`, `OVERWRITE`, `DRY_RUN`, `LOG_FILE`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::answer::{DEFAULT_CHAT_MODEL, DEFAULT_CHAT_URL};
use crate::chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedding::{
    DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_URL,
};
use crate::errors::{BenchError, Result};
use crate::index::{DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};
use crate::rag::reranking::DEFAULT_RERANK_MODEL;
use crate::rag::retrieval::{SearchParams, DEFAULT_TOP_K, DEFAULT_TOP_N};
use crate::runner::RunnerConfig;
use crate::types::Configuration;

/// Environment variable holding the embedding API key
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable holding the answer API key
pub const OPENROUTER_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Complete configuration for ragbench
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub paths: PathsConfig,
    pub chunking: ChunkingSection,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub answer: AnswerConfig,
    pub runner: RunnerSection,
}

/// File system paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Knowledge base: `*.md` documents, `queries.jsonl`, ledgers
    pub kb_dir: String,
    /// Embedding cache directory (defaults to `<kb_dir>/embeddings_cache`)
    pub cache_dir: Option<String>,
    pub log_file: String,
}

/// Chunk window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible HTTP API
    OpenAi,
    /// Sentence-transformer run in-process with Candle
    Local,
}

/// Embedding provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Qdrant,
}

/// Vector index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub collection: String,
    pub qdrant_url: String,
    /// Drop an existing Qdrant collection at startup
    pub recreate: bool,
}

/// Retrieval depth configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub top_n: usize,
}

/// Reranker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub model: String,
}

/// Answer generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

/// Run loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    pub request_interval_ms: u64,
    pub overwrite: bool,
    pub dry_run: bool,
    pub show_progress: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            kb_dir: "output/kb".to_string(),
            cache_dir: None,
            log_file: "logs/ragbench.log".to_string(),
        }
    }
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIM,
            batch_size: DEFAULT_BATCH_SIZE,
            base_url: DEFAULT_OPENAI_URL.to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            collection: DEFAULT_COLLECTION.to_string(),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            recreate: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_RERANK_MODEL.to_string(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHAT_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            max_retries: 5,
            timeout_secs: 120,
        }
    }
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            request_interval_ms: 3000,
            overwrite: false,
            dry_run: false,
            show_progress: true,
        }
    }
}

impl BenchConfig {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BenchError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: BenchConfig = toml::from_str(&contents)
            .map_err(|e| BenchError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".ragbench").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(BenchConfig::default())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kb_dir) = lookup("KB_DIR").filter(|v| !v.trim().is_empty()) {
            self.paths.kb_dir = kb_dir;
        }
        if let Some(log_file) = lookup("LOG_FILE").filter(|v| !v.trim().is_empty()) {
            self.paths.log_file = log_file;
        }
        if let Some(overwrite) = lookup("OVERWRITE") {
            self.runner.overwrite = parse_flag(&overwrite);
        }
        if let Some(dry_run) = lookup("DRY_RUN") {
            self.runner.dry_run = parse_flag(&dry_run);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.chunking_config()?;

        if self.embedding.batch_size == 0 {
            return Err(BenchError::ConfigError(
                "embedding batch_size must be greater than 0".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(BenchError::ConfigError(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        self.search_params().validate()?;

        if self.answer.max_retries == 0 {
            return Err(BenchError::ConfigError(
                "answer max_retries must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.answer.temperature) {
            return Err(BenchError::ConfigError(format!(
                "answer temperature must be between 0.0 and 2.0, got {}",
                self.answer.temperature
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BenchError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BenchError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| BenchError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn kb_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.kb_dir)
    }

    pub fn queries_path(&self) -> PathBuf {
        self.kb_dir().join("queries.jsonl")
    }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.paths.cache_dir {
            Some(dir) => Self::expand_path(dir),
            None => self.kb_dir().join("embeddings_cache"),
        }
    }

    /// Results ledger for one configuration
    pub fn ledger_path(&self, configuration: Configuration) -> PathBuf {
        self.kb_dir().join(configuration.ledger_file_name())
    }

    pub fn log_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.log_file)
    }

    pub fn chunking_config(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunking.size, self.chunking.overlap)
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            top_k: self.retrieval.top_k,
            top_n: self.retrieval.top_n,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            params: self.search_params(),
            request_interval: Duration::from_millis(self.runner.request_interval_ms),
            dry_run: self.runner.dry_run,
            show_progress: self.runner.show_progress,
            model: self.answer.model.clone(),
        }
    }

    /// Read a secret from the environment
    pub fn secret(name: &str) -> Result<String> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                BenchError::ConfigError(format!(
                    "{} environment variable is required unless DRY_RUN=true",
                    name
                ))
            })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
