//! Query inputs, configurations and ledger records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::{BenchError, Result};
use crate::types::chunk::Chunk;

/// One of the four answer-generation configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Configuration {
    /// E1: no retrieval baseline
    #[serde(rename = "E1", alias = "e1")]
    NoRetrieval,
    /// E2: dense top-K retrieval
    #[serde(rename = "E2", alias = "e2")]
    Retrieval,
    /// E3: dense top-N, reranked to top-K
    #[serde(rename = "E3", alias = "e3")]
    Rerank,
    /// E4: reranked retrieval with a step-by-step rationale
    #[serde(rename = "E4", alias = "e4")]
    Reasoning,
}

impl Configuration {
    pub const ALL: [Configuration; 4] = [
        Configuration::NoRetrieval,
        Configuration::Retrieval,
        Configuration::Rerank,
        Configuration::Reasoning,
    ];

    /// Short tag written to ledgers
    pub fn tag(&self) -> &'static str {
        match self {
            Configuration::NoRetrieval => "E1",
            Configuration::Retrieval => "E2",
            Configuration::Rerank => "E3",
            Configuration::Reasoning => "E4",
        }
    }

    /// Default ledger file for this configuration
    pub fn ledger_file_name(&self) -> &'static str {
        match self {
            Configuration::NoRetrieval => "e1_baseline.jsonl",
            Configuration::Retrieval => "e2_standard_rag.jsonl",
            Configuration::Rerank => "e3_filtered_rag.jsonl",
            Configuration::Reasoning => "e4_reasoning_rag.jsonl",
        }
    }

    pub fn uses_retrieval(&self) -> bool {
        !matches!(self, Configuration::NoRetrieval)
    }

    pub fn uses_rerank(&self) -> bool {
        matches!(self, Configuration::Rerank | Configuration::Reasoning)
    }

    pub fn expects_reasoning(&self) -> bool {
        matches!(self, Configuration::Reasoning)
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Configuration::NoRetrieval => "baseline",
            Configuration::Retrieval => "standard RAG",
            Configuration::Rerank => "filtered RAG",
            Configuration::Reasoning => "reasoning RAG",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Configuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e1" | "baseline" => Ok(Configuration::NoRetrieval),
            "e2" | "standard" | "rag" => Ok(Configuration::Retrieval),
            "e3" | "filtered" | "rerank" => Ok(Configuration::Rerank),
            "e4" | "reasoning" => Ok(Configuration::Reasoning),
            other => Err(format!(
                "unknown configuration '{}' (expected E1, E2, E3 or E4)",
                other
            )),
        }
    }
}

/// A query to run, as read from the queries file.
///
/// Fields beyond the three required ones are kept and echoed into results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: String,
    #[serde(alias = "query_text")]
    pub query: String,
    #[serde(default)]
    pub ground_truth: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryRecord {
    /// Create new query record without passthrough fields
    pub fn new(
        query_id: impl Into<String>,
        query: impl Into<String>,
        ground_truth: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            query: query.into(),
            ground_truth: ground_truth.into(),
            extra: Map::new(),
        }
    }
}

/// Chunk as recorded in a ledger line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub text: String,
    /// Rerank score when reranked, else similarity
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<&Chunk> for RetrievedChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            text: chunk.text.clone(),
            score: chunk.effective_score(),
            similarity_score: chunk.similarity_score,
            rerank_score: chunk.rerank_score,
            metadata: chunk.metadata(),
        }
    }
}

/// Keys owned by `ExperimentResult`; passthrough fields may not shadow them.
const RESERVED_KEYS: &[&str] = &[
    "query_id",
    "experiment",
    "query",
    "retrieved_chunks",
    "llm_answer",
    "reasoning_steps",
    "error",
    "ground_truth",
    "retrieval_time_ms",
    "llm_time_ms",
    "total_time_ms",
    "model",
    "dry_run",
    "run_id",
    "recorded_at",
];

/// One ledger line: the outcome of a `(query, configuration)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub query_id: String,
    #[serde(rename = "experiment")]
    pub configuration: Configuration,
    pub query: String,
    #[serde(default)]
    pub retrieved_chunks: Vec<RetrievedChunk>,
    #[serde(rename = "llm_answer")]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub ground_truth: String,
    #[serde(default)]
    pub retrieval_time_ms: f64,
    #[serde(rename = "llm_time_ms", default)]
    pub answer_time_ms: f64,
    #[serde(default)]
    pub total_time_ms: f64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl ExperimentResult {
    /// Start a result for `query` under `configuration`.
    ///
    /// Answer, chunks and timings are filled in by the runner before
    /// `validate` is called.
    pub fn new(query: &QueryRecord, configuration: Configuration, model: &str) -> Self {
        let passthrough = query
            .extra
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            query_id: query.query_id.clone(),
            configuration,
            query: query.query.clone(),
            retrieved_chunks: Vec::new(),
            answer: String::new(),
            reasoning_steps: None,
            error: None,
            ground_truth: query.ground_truth.clone(),
            retrieval_time_ms: 0.0,
            answer_time_ms: 0.0,
            total_time_ms: 0.0,
            model: model.to_string(),
            dry_run: false,
            run_id: String::new(),
            recorded_at: Utc::now(),
            passthrough,
        }
    }

    /// `(query_id, configuration)` identity used for resume
    pub fn key(&self) -> (String, Configuration) {
        (self.query_id.clone(), self.configuration)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check record invariants before it is written
    pub fn validate(&self) -> Result<()> {
        if self.query_id.trim().is_empty() {
            return Err(BenchError::DataError("result has empty query_id".to_string()));
        }
        if !self.configuration.uses_retrieval() && !self.retrieved_chunks.is_empty() {
            return Err(BenchError::DataError(format!(
                "{} result for {} carries retrieved chunks",
                self.configuration, self.query_id
            )));
        }
        if self.configuration.expects_reasoning() && self.reasoning_steps.is_none() {
            return Err(BenchError::DataError(format!(
                "{} result for {} has no reasoning steps",
                self.configuration, self.query_id
            )));
        }
        if self.total_time_ms < 0.0 || self.retrieval_time_ms < 0.0 || self.answer_time_ms < 0.0 {
            return Err(BenchError::DataError(format!(
                "negative timing in result for {}",
                self.query_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configuration_tags_roundtrip_through_serde() {
        for configuration in Configuration::ALL {
            let value = serde_json::to_value(configuration).unwrap();
            assert_eq!(value, json!(configuration.tag()));
        }
    }

    #[test]
    fn test_configuration_accepts_lowercase_tags() {
        for configuration in Configuration::ALL {
            let lower = json!(configuration.tag().to_lowercase());
            assert_eq!(serde_json::from_value::<Configuration>(lower).unwrap(), configuration);
        }
    }

    #[test]
    fn test_configuration_from_str() {
        assert_eq!("E3".parse::<Configuration>().unwrap(), Configuration::Rerank);
        assert_eq!("e4".parse::<Configuration>().unwrap(), Configuration::Reasoning);
        assert_eq!("baseline".parse::<Configuration>().unwrap(), Configuration::NoRetrieval);
        assert!("E9".parse::<Configuration>().is_err());
    }

    #[test]
    fn test_configuration_capabilities() {
        assert!(!Configuration::NoRetrieval.uses_retrieval());
        assert!(Configuration::Retrieval.uses_retrieval());
        assert!(!Configuration::Retrieval.uses_rerank());
        assert!(Configuration::Rerank.uses_rerank());
        assert!(Configuration::Reasoning.expects_reasoning());
    }

    #[test]
    fn test_query_record_accepts_alias_and_extra_fields() {
        let line = r#"{"query_id":"q1","query_text":"Where is my order?","ground_truth":"Shipped","query_type":"factual","context_reference":["orders.md"]}"#;
        let record: QueryRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.query, "Where is my order?");
        assert_eq!(record.extra["query_type"], "factual");
        assert_eq!(record.extra["context_reference"], json!(["orders.md"]));
    }

    #[test]
    fn test_result_wire_names() {
        let mut query = QueryRecord::new("q1", "Return policy?", "30 days");
        query.extra.insert("query_type".into(), json!("policy"));
        let mut result = ExperimentResult::new(&query, Configuration::Retrieval, "model-x");
        result.answer = "30 days".to_string();

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["experiment"], "E2");
        assert_eq!(value["llm_answer"], "30 days");
        assert_eq!(value["query_type"], "policy");
        assert!(value.get("llm_time_ms").is_some());
        assert!(value.get("reasoning_steps").is_none());

        let back: ExperimentResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.key(), ("q1".to_string(), Configuration::Retrieval));
        assert_eq!(back.passthrough["query_type"], "policy");
    }

    #[test]
    fn test_passthrough_cannot_shadow_result_fields() {
        let mut query = QueryRecord::new("q1", "text", "truth");
        query.extra.insert("experiment".into(), json!("bogus"));
        let result = ExperimentResult::new(&query, Configuration::Rerank, "m");
        assert!(result.passthrough.is_empty());
    }

    #[test]
    fn test_validate_requires_reasoning_for_e4() {
        let query = QueryRecord::new("q1", "text", "truth");
        let mut result = ExperimentResult::new(&query, Configuration::Reasoning, "m");
        assert!(result.validate().is_err());
        result.reasoning_steps = Some("step 1".into());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_chunks_for_baseline() {
        let query = QueryRecord::new("q1", "text", "truth");
        let mut result = ExperimentResult::new(&query, Configuration::NoRetrieval, "m");
        result
            .retrieved_chunks
            .push(RetrievedChunk::from(&Chunk::new("a#chunk_0", "t", "", "a", 0)));
        assert!(result.validate().is_err());
    }
}
