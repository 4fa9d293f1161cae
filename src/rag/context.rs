// Context assembly: source-attributed passages and the user prompt
use crate::types::Chunk;

/// Context builder configuration
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    /// Stop adding passages once this many estimated tokens are used
    pub max_context_tokens: Option<usize>,

    /// Append `(score: x.xxxx)` to each source label
    pub include_scores: bool,
}

/// Assembled context ready for the answer prompt
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Formatted context string
    pub text: String,

    /// Number of passages included
    pub source_count: usize,

    /// Ids of the included chunks, in citation order
    pub chunk_ids: Vec<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.source_count == 0
    }
}

/// Builds numbered, source-attributed context from ranked chunks.
///
/// Passage `i` (1-based) is rendered as `[Source i: <filename>]` followed by
/// its text, so the model can cite `[Source i]` in its answer.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    /// Create new context builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Render chunks in rank order
    pub fn build(&self, chunks: &[Chunk]) -> AssembledContext {
        let mut blocks = Vec::with_capacity(chunks.len());
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        let mut used_tokens = 0usize;

        for chunk in chunks {
            let label = if self.config.include_scores {
                format!(
                    "[Source {}: {}] (score: {:.4})",
                    blocks.len() + 1,
                    chunk.source_filename,
                    chunk.effective_score()
                )
            } else {
                format!("[Source {}: {}]", blocks.len() + 1, chunk.source_filename)
            };
            let block = format!("{}\n{}", label, chunk.text);

            let tokens = estimate_tokens(&block);
            if let Some(max) = self.config.max_context_tokens {
                if used_tokens + tokens > max && !blocks.is_empty() {
                    break;
                }
            }
            used_tokens += tokens;

            blocks.push(block);
            chunk_ids.push(chunk.chunk_id.clone());
        }

        AssembledContext {
            text: blocks.join("\n\n"),
            source_count: blocks.len(),
            chunk_ids,
        }
    }

    /// User message for the answer generator.
    ///
    /// Without context (no-retrieval configuration) the query is sent as-is.
    pub fn user_prompt(&self, query: &str, context: Option<&AssembledContext>) -> String {
        match context {
            Some(context) => format!("Context:\n{}\n\nQuestion: {}", context.text, query),
            None => query.to_string(),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ContextConfig) {
        self.config = config;
    }
}

/// Rough token estimate (4 chars per token)
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
