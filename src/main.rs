//! ragbench - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use ragbench::{
    answer::{AnswerGenerator, ChatCompletionsClient},
    chunking::{window_spans, MarkdownChunker},
    cli::{
        config::{OPENAI_KEY_VAR, OPENROUTER_KEY_VAR},
        Args, BenchConfig, Commands, EmbeddingBackend, IndexBackend,
    },
    corpus,
    embedding::{
        EmbeddingCache, EmbeddingProvider, EmbeddingService, LocalEmbeddings, OpenAiEmbeddings,
        DEFAULT_EMBEDDING_MODEL, DEFAULT_LOCAL_MODEL,
    },
    index::{MemoryIndex, QdrantIndex, VectorIndex},
    ledger::Ledger,
    logging::init_logging,
    rag::{
        reranking::{CrossEncoderScorer, ReRanker},
        RetrievalEngine,
    },
    retry::RetryManager,
    runner::{ExperimentRunner, RunSummary},
    types::{CacheRole, Chunk, Configuration},
    validate::validate_ledger,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();

    let mut config = BenchConfig::load(args.config.clone())?;
    config.apply_env();
    apply_command_overrides(&mut config, &args.command);
    config.runner.show_progress &= verbosity.show_progress();
    config.validate()?;

    init_logging(&config.log_file(), verbosity.log_filter())?;
    info!(verbosity = verbosity.as_str(), kb_dir = %config.kb_dir().display(), "ragbench starting");

    match &args.command {
        Commands::Run { only, .. } => {
            let selected = Commands::selected_configurations(only);
            run_experiments(&config, &selected).await?;
        }
        Commands::Index { .. } => {
            warm_index(&config).await?;
        }
        Commands::Chunk { file } => {
            show_chunks(&config, file)?;
        }
        Commands::Validate { .. } => {
            if !validate_ledgers(&config)? {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Flags given on the command line win over file and environment
fn apply_command_overrides(config: &mut BenchConfig, command: &Commands) {
    let kb_dir = match command {
        Commands::Run {
            overwrite,
            dry_run,
            kb_dir,
            ..
        } => {
            config.runner.overwrite |= *overwrite;
            config.runner.dry_run |= *dry_run;
            kb_dir
        }
        Commands::Index { kb_dir } | Commands::Validate { kb_dir } => kb_dir,
        Commands::Chunk { .. } | Commands::Config => return,
    };
    if let Some(dir) = kb_dir {
        config.paths.kb_dir = dir.to_string_lossy().into_owned();
    }
}

async fn run_experiments(config: &BenchConfig, selected: &[Configuration]) -> Result<()> {
    let dry_run = config.runner.dry_run;
    let needs_retrieval = selected.iter().any(|c| c.uses_retrieval());
    let needs_rerank = selected.iter().any(|c| c.uses_rerank());

    let queries = corpus::load_queries(&config.queries_path())?;
    println!(
        "{} {} queries, configurations: {}{}",
        "▶".cyan(),
        queries.len(),
        selected
            .iter()
            .map(|c| c.tag())
            .collect::<Vec<_>>()
            .join(", "),
        if dry_run { " (dry run)".yellow().to_string() } else { String::new() }
    );

    let mut runner = ExperimentRunner::new(config.runner_config());
    if !dry_run {
        runner = runner.with_generator(build_generator(config)?);
        if needs_retrieval {
            let engine = build_retrieval(config, needs_rerank).await?;
            runner = runner.with_retrieval(Arc::new(engine));
        }
    }

    if needs_retrieval {
        let chunks = chunk_corpus(config)?;
        let report = runner
            .index_corpus(chunks, config.embedding.batch_size)
            .await?;
        if !report.skipped {
            println!("{} indexed {} chunks", "✓".green(), report.indexed);
        }
    }

    for configuration in selected {
        let mut ledger = Ledger::open(config.ledger_path(*configuration), config.runner.overwrite)?;
        let summary = runner.run(*configuration, &queries, &mut ledger).await?;
        print_summary(&summary, ledger.path());
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, ledger: &Path) {
    let status = if summary.failed == 0 {
        "✓".green()
    } else {
        "!".yellow()
    };
    println!(
        "{} {} {:<20} processed {}, skipped {}, failed {} → {}",
        status,
        summary.configuration.tag().bold(),
        summary.configuration.display_name(),
        summary.processed,
        summary.skipped,
        if summary.failed > 0 {
            summary.failed.to_string().red().to_string()
        } else {
            summary.failed.to_string()
        },
        ledger.display()
    );
}

fn build_generator(config: &BenchConfig) -> Result<Arc<dyn AnswerGenerator>> {
    let api_key = BenchConfig::secret(OPENROUTER_KEY_VAR)?;
    let client = ChatCompletionsClient::with_config(&config.answer.base_url, api_key, &config.answer.model)?
        .with_retries(config.answer.max_retries, 1000)
        .with_temperature(config.answer.temperature)
        .with_timeout(std::time::Duration::from_secs(config.answer.timeout_secs))?;
    Ok(Arc::new(client))
}

async fn build_embeddings(config: &BenchConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding.backend {
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbeddings::with_config(
            &config.embedding.base_url,
            BenchConfig::secret(OPENAI_KEY_VAR)?,
            &config.embedding.model,
            config.embedding.dimension,
            RetryManager::new(),
        )?),
        EmbeddingBackend::Local => {
            let model = if config.embedding.model == DEFAULT_EMBEDDING_MODEL {
                DEFAULT_LOCAL_MODEL.to_string()
            } else {
                config.embedding.model.clone()
            };
            let local = tokio::task::spawn_blocking(move || LocalEmbeddings::load(&model))
                .await
                .context("Embedding model loader panicked")??;
            Arc::new(local)
        }
    };
    info!(model = provider.model_id(), dimension = provider.dimension(), "embedding provider ready");
    Ok(provider)
}

async fn build_retrieval(config: &BenchConfig, with_rerank: bool) -> Result<RetrievalEngine> {
    let provider = build_embeddings(config).await?;
    let dimension = provider.dimension();
    let cache = EmbeddingCache::open(config.cache_dir())?;
    let service = Arc::new(EmbeddingService::new(provider, cache));

    let index: Arc<dyn VectorIndex> = match config.index.backend {
        IndexBackend::Memory => Arc::new(MemoryIndex::new(dimension)?),
        IndexBackend::Qdrant => Arc::new(
            QdrantIndex::connect(
                &config.index.qdrant_url,
                &config.index.collection,
                dimension,
                config.index.recreate,
            )
            .await?,
        ),
    };

    let mut engine = RetrievalEngine::new(service, index)?.with_params(config.search_params());
    if with_rerank {
        let model = config.rerank.model.clone();
        let scorer = tokio::task::spawn_blocking(move || CrossEncoderScorer::load(&model))
            .await
            .context("Rerank model loader panicked")??;
        engine = engine.with_reranker(ReRanker::new(Arc::new(scorer)));
    }
    Ok(engine)
}

fn chunk_corpus(config: &BenchConfig) -> Result<Vec<Chunk>> {
    let documents = corpus::load_documents(&config.kb_dir())?;
    let chunker = MarkdownChunker::with_config(config.chunking_config()?);
    let chunks = chunker.chunk_documents(&documents);
    info!(documents = documents.len(), chunks = chunks.len(), "chunked corpus");
    Ok(chunks)
}

async fn warm_index(config: &BenchConfig) -> Result<()> {
    let mut chunks = chunk_corpus(config)?;
    let provider = build_embeddings(config).await?;
    let service = EmbeddingService::new(provider, EmbeddingCache::open(config.cache_dir())?);

    let before = service.cached(CacheRole::Chunk)?;
    service
        .embed_chunks(&mut chunks, config.embedding.batch_size)
        .await?;
    let after = service.cached(CacheRole::Chunk)?;

    println!("{} {} chunks embedded", "✓".green(), chunks.len());
    println!("  Newly cached:  {}", after - before);
    println!("  Cache total:   {}", after);
    println!("  Cache dir:     {}", config.cache_dir().display());
    Ok(())
}

fn show_chunks(config: &BenchConfig, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let chunking = config.chunking_config()?;

    for (section_idx, section) in MarkdownChunker::sections(&text).iter().enumerate() {
        let len = section.body.chars().count();
        let header = if section.header.is_empty() {
            "(no header)".dimmed().to_string()
        } else {
            section.header.bold().to_string()
        };
        println!("{}", header);

        if len <= chunking.size() || chunking.step() == 0 {
            println!("  {}#chunk_{}  [0, {})", filename, section_idx, len);
            continue;
        }
        for (sub_idx, span) in window_spans(len, chunking.size(), chunking.overlap())
            .into_iter()
            .enumerate()
        {
            println!(
                "  {}#chunk_{}_{}  [{}, {})",
                filename, section_idx, sub_idx, span.start, span.end
            );
        }
    }

    let total = MarkdownChunker::with_config(chunking).chunk(&filename, &text).len();
    println!("\n{} chunks", total);
    Ok(())
}

/// Returns false when any ledger has problems
fn validate_ledgers(config: &BenchConfig) -> Result<bool> {
    let mut all_ok = true;
    for configuration in Configuration::ALL {
        let report = validate_ledger(&config.ledger_path(configuration), configuration)?;
        if report.is_ok() {
            println!(
                "{} {} {} records ({} with errors)",
                "✓".green(),
                configuration.tag().bold(),
                report.lines,
                report.errors
            );
        } else {
            all_ok = false;
            println!(
                "{} {} {} problem(s) in {}",
                "✗".red(),
                configuration.tag().bold(),
                report.problems.len(),
                report.path.display()
            );
            for problem in &report.problems {
                println!("    {}", problem);
            }
        }
    }
    Ok(all_ok)
}

fn show_config(config: &BenchConfig) -> Result<()> {
    println!("{}", "ragbench configuration".bold());
    println!();
    print!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    println!();
    println!("Derived paths:");
    println!("  Queries:  {}", config.queries_path().display());
    println!("  Cache:    {}", config.cache_dir().display());
    println!("  Log file: {}", config.log_file().display());
    Ok(())
}
