// Resumable experiment runner
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{QueryEvent, QueryState};
use crate::answer::{AnswerGenerator, AnswerRequest, GeneratedAnswer, DEFAULT_CHAT_MODEL};
use crate::errors::{BenchError, Result};
use crate::ledger::Ledger;
use crate::rag::{ContextBuilder, IndexReport, RetrievalEngine, SearchParams};
use crate::types::{Chunk, Configuration, ExperimentResult, QueryRecord, RetrievedChunk};

/// Default pause between remote calls (3 seconds)
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

const DRY_RUN_ANSWER: &str = "[DRY_RUN] No LLM call";
const DRY_RUN_REASONING: &str =
    "[DRY_RUN] Step 1: Analyze query\nStep 2: Check context\nStep 3: Provide reasoning\nStep 4: Final answer";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Retrieval depth (`top_k`) and rerank candidates (`top_n`)
    pub params: SearchParams,

    /// Minimum spacing between processed queries
    pub request_interval: Duration,

    /// Skip every remote call and record placeholder results
    pub dry_run: bool,

    /// Draw a progress bar on stderr
    pub show_progress: bool,

    /// Model name recorded when no generator is attached
    pub model: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            params: SearchParams::default(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            dry_run: false,
            show_progress: false,
            model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }
}

/// Counts for one configuration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub configuration: Configuration,
    /// Results appended by this run (including error results)
    pub processed: usize,
    /// Pairs already in the ledger, plus queries without an id
    pub skipped: usize,
    /// Results that carry an error or that the ledger rejected
    pub failed: usize,
}

impl RunSummary {
    fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            processed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Drives queries through retrieval and answering into a ledger.
///
/// Collaborators are optional so that a no-retrieval run needs no index
/// and a dry run needs nothing at all; `preflight` checks that the selected
/// configuration has what it needs before any query is touched.
pub struct ExperimentRunner {
    config: RunnerConfig,
    retrieval: Option<Arc<RetrievalEngine>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    context: ContextBuilder,
    run_id: String,
}

impl ExperimentRunner {
    /// Create new runner with no collaborators attached
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            retrieval: None,
            generator: None,
            context: ContextBuilder::new(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_retrieval(mut self, retrieval: Arc<RetrievalEngine>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Identifier stamped on every result of this runner
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn model_label(&self) -> &str {
        self.generator
            .as_ref()
            .map(|g| g.model_id())
            .unwrap_or(self.config.model.as_str())
    }

    /// Fail fast when `configuration` lacks a collaborator
    pub fn preflight(&self, configuration: Configuration) -> Result<()> {
        self.config.params.validate()?;
        if self.config.dry_run {
            return Ok(());
        }

        if self.generator.is_none() {
            return Err(BenchError::NotConfigured(format!(
                "answer generator for {}",
                configuration
            )));
        }
        if configuration.uses_retrieval() {
            let retrieval = self.retrieval.as_ref().ok_or_else(|| {
                BenchError::NotConfigured(format!("retrieval engine for {}", configuration))
            })?;
            if configuration.uses_rerank() && !retrieval.has_reranker() {
                return Err(BenchError::NotConfigured(format!(
                    "reranker for {}",
                    configuration
                )));
            }
        }
        Ok(())
    }

    /// Embed and index chunks unless the index is already populated
    pub async fn index_corpus(&self, chunks: Vec<Chunk>, batch_size: usize) -> Result<IndexReport> {
        if self.config.dry_run {
            info!("dry run, not indexing");
            return Ok(IndexReport {
                indexed: 0,
                skipped: true,
            });
        }
        let retrieval = self
            .retrieval
            .as_ref()
            .ok_or_else(|| BenchError::NotConfigured("retrieval engine for indexing".to_string()))?;
        retrieval.index_chunks(chunks, batch_size).await
    }

    /// Process every query not yet in the ledger for `configuration`.
    ///
    /// Provider failures become error results and the run continues;
    /// fatal errors (index, I/O, configuration) abort it.
    pub async fn run(
        &self,
        configuration: Configuration,
        queries: &[QueryRecord],
        ledger: &mut Ledger,
    ) -> Result<RunSummary> {
        self.preflight(configuration)?;

        info!(
            configuration = %configuration,
            queries = queries.len(),
            already_recorded = ledger.len(),
            dry_run = self.config.dry_run,
            run_id = %self.run_id,
            "starting run"
        );

        let progress = self.progress_bar(configuration, queries.len());
        let mut summary = RunSummary::new(configuration);

        for (position, query) in queries.iter().enumerate() {
            if ledger.contains(&query.query_id, configuration) {
                summary.skipped += 1;
                progress.inc(1);
                continue;
            }

            if query.query_id.trim().is_empty() {
                warn!(position, "skipping query with empty query_id");
                summary.skipped += 1;
                progress.inc(1);
                continue;
            }

            let started = Instant::now();
            let (state, result) = self.process(configuration, query).await?;
            match ledger.append(&result) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(query_id = %query.query_id, error = %e, "result rejected by ledger");
                    summary.failed += 1;
                    progress.inc(1);
                    continue;
                }
            }

            let event = if result.is_error() {
                QueryEvent::RecordError
            } else {
                QueryEvent::Record
            };
            let state = state.transition(event)?;
            debug!(query_id = %query.query_id, state = state.display_name(), "query finished");

            summary.processed += 1;
            if result.is_error() {
                summary.failed += 1;
            }
            progress.inc(1);

            let is_last = position + 1 == queries.len();
            if !self.config.dry_run && !is_last {
                let pause = remaining_delay(self.config.request_interval, started.elapsed());
                if !pause.is_zero() {
                    sleep(pause).await;
                }
            }
        }

        progress.finish_and_clear();
        info!(
            configuration = %configuration,
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );
        Ok(summary)
    }

    /// Run one query up to (not including) persistence
    async fn process(
        &self,
        configuration: Configuration,
        query: &QueryRecord,
    ) -> Result<(QueryState, ExperimentResult)> {
        let started = Instant::now();
        let mut state = QueryState::Pending;
        let mut result = ExperimentResult::new(query, configuration, self.model_label());
        result.run_id = self.run_id.clone();
        result.dry_run = self.config.dry_run;

        let chunks = if configuration.uses_retrieval() {
            state = state.transition(QueryEvent::StartRetrieval)?;
            let retrieval_started = Instant::now();
            let outcome = self.retrieve(configuration, &query.query).await;
            result.retrieval_time_ms = millis(retrieval_started.elapsed());

            match outcome {
                Ok(chunks) => chunks,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(query_id = %query.query_id, error = %e, "retrieval failed");
                    record_failure(&mut result, &e);
                    result.total_time_ms = millis(started.elapsed());
                    return Ok((state, result));
                }
            }
        } else {
            Vec::new()
        };

        state = state.transition(QueryEvent::StartAnswering)?;
        result.retrieved_chunks = chunks.iter().map(RetrievedChunk::from).collect();

        let context = configuration
            .uses_retrieval()
            .then(|| self.context.build(&chunks));
        let request = AnswerRequest::new(
            configuration,
            self.context.user_prompt(&query.query, context.as_ref()),
        );

        let answer_started = Instant::now();
        let outcome = self.answer(&request).await;
        result.answer_time_ms = millis(answer_started.elapsed());

        match outcome {
            Ok(generated) => {
                result.answer = generated.answer;
                result.reasoning_steps = generated
                    .reasoning_steps
                    .or_else(|| configuration.expects_reasoning().then(String::new));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(query_id = %query.query_id, error = %e, "answer generation failed");
                record_failure(&mut result, &e);
            }
        }

        result.total_time_ms = millis(started.elapsed());
        Ok((state, result))
    }

    async fn retrieve(&self, configuration: Configuration, query: &str) -> Result<Vec<Chunk>> {
        if self.config.dry_run {
            return Ok(dry_run_chunks(configuration, self.config.params));
        }
        let retrieval = self
            .retrieval
            .as_ref()
            .ok_or_else(|| BenchError::NotConfigured(format!("retrieval engine for {}", configuration)))?;
        retrieval
            .retrieve_with_params(query, configuration, self.config.params)
            .await
    }

    async fn answer(&self, request: &AnswerRequest) -> Result<GeneratedAnswer> {
        if self.config.dry_run {
            return Ok(GeneratedAnswer {
                answer: DRY_RUN_ANSWER.to_string(),
                reasoning_steps: request
                    .configuration
                    .expects_reasoning()
                    .then(|| DRY_RUN_REASONING.to_string()),
            });
        }
        let generator = self.generator.as_ref().ok_or_else(|| {
            BenchError::NotConfigured(format!("answer generator for {}", request.configuration))
        })?;
        generator.generate(request).await
    }

    fn progress_bar(&self, configuration: Configuration, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} | ETA: {eta}")
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_prefix(configuration.tag());
        pb
    }
}

/// Time still to wait so that consecutive queries start `interval` apart
pub fn remaining_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn record_failure(result: &mut ExperimentResult, error: &BenchError) {
    result.answer = format!("Error: {}", error);
    result.error = Some(error.to_string());
    if result.configuration.expects_reasoning() {
        result.reasoning_steps = Some(format!("Error during reasoning: {}", error));
    }
}

/// Placeholder chunks with descending scores.
///
/// Rerank configurations get `top_n` candidates, rescored and cut to `top_k`.
fn dry_run_chunks(configuration: Configuration, params: SearchParams) -> Vec<Chunk> {
    let candidates = if configuration.uses_rerank() {
        params.top_n
    } else {
        params.top_k
    };

    let mut chunks: Vec<Chunk> = (0..candidates)
        .map(|i| {
            let mut chunk = Chunk::new(
                format!("dry_run_chunk_{}", i),
                format!("[DRY_RUN] Mock chunk {}", i),
                "",
                "dry_run.md",
                i,
            );
            chunk.similarity_score = Some(0.9 - i as f32 * 0.01);
            chunk
        })
        .collect();

    if configuration.uses_rerank() {
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.rerank_score = Some(1.0 - i as f32 * 0.05);
        }
        chunks.truncate(params.top_k);
    }
    chunks
}
