//! Integration tests for the experiment runner
//!
//! Runs the full chunk → embed → index → retrieve → answer → ledger path
//! with in-process provider doubles; no network needed.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{engine, engine_with_rerank_failure, write_kb, CountingEmbedder, FlakyGenerator};
use ragbench::{
    chunking::MarkdownChunker,
    corpus,
    ledger::{read_ledger, Ledger, LedgerLine},
    rag::SearchParams,
    runner::{ExperimentRunner, RunnerConfig},
    types::{Configuration, ExperimentResult},
    validate::validate_ledger,
};

fn fast_config() -> RunnerConfig {
    RunnerConfig {
        params: SearchParams { top_k: 2, top_n: 4 },
        request_interval: Duration::ZERO,
        ..RunnerConfig::default()
    }
}

fn records(path: &std::path::Path) -> Vec<ExperimentResult> {
    read_ledger(path)
        .unwrap()
        .into_iter()
        .filter_map(|line| match line {
            LedgerLine::Record(record) => Some(*record),
            LedgerLine::Malformed { .. } => None,
        })
        .collect()
}

async fn indexed_runner(
    kb: &TempDir,
    embedder: Arc<CountingEmbedder>,
    generator: Arc<FlakyGenerator>,
) -> ExperimentRunner {
    let runner = ExperimentRunner::new(fast_config())
        .with_retrieval(Arc::new(engine(&kb.path().join("embeddings_cache"), embedder)))
        .with_generator(generator);

    let documents = corpus::load_documents(kb.path()).unwrap();
    let chunks = MarkdownChunker::new().chunk_documents(&documents);
    runner.index_corpus(chunks, 100).await.unwrap();
    runner
}

#[tokio::test]
async fn test_all_configurations_end_to_end() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 3);
    let embedder = Arc::new(CountingEmbedder::default());
    let generator = Arc::new(FlakyGenerator::reliable());
    let runner = indexed_runner(&kb, embedder, generator.clone()).await;
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();

    for configuration in Configuration::ALL {
        let path = kb.path().join(configuration.ledger_file_name());
        let mut ledger = Ledger::open(&path, false).unwrap();
        let summary = runner.run(configuration, &queries, &mut ledger).await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 0);

        let report = validate_ledger(&path, configuration).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);

        let first = &records(&path)[0];
        assert_eq!(first.configuration, configuration);
        assert_eq!(first.model, "flaky");
        assert_eq!(first.passthrough.get("difficulty").unwrap(), "easy");
        if configuration.uses_retrieval() {
            assert_eq!(first.retrieved_chunks.len(), 2);
            assert!(first.retrieved_chunks[0].chunk_id.starts_with("returns.md#chunk_"));
        } else {
            assert!(first.retrieved_chunks.is_empty());
        }
        if configuration.uses_rerank() {
            assert!(first.retrieved_chunks.iter().all(|c| c.rerank_score.is_some()));
        }
    }

    assert_eq!(generator.calls(), 12);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 4);
    let embedder = Arc::new(CountingEmbedder::default());
    let generator = Arc::new(FlakyGenerator::reliable());
    let runner = indexed_runner(&kb, embedder.clone(), generator.clone()).await;
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let path = kb.path().join(Configuration::Retrieval.ledger_file_name());

    let mut ledger = Ledger::open(&path, false).unwrap();
    runner.run(Configuration::Retrieval, &queries, &mut ledger).await.unwrap();
    drop(ledger);

    let embed_calls = embedder.calls();
    let answer_calls = generator.calls();

    let mut ledger = Ledger::open(&path, false).unwrap();
    let summary = runner.run(Configuration::Retrieval, &queries, &mut ledger).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 4);
    assert_eq!(embedder.calls(), embed_calls);
    assert_eq!(generator.calls(), answer_calls);
    assert_eq!(records(&path).len(), 4);
}

#[tokio::test]
async fn test_resume_processes_only_missing_queries() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 10);
    let generator = Arc::new(FlakyGenerator::reliable());
    let runner = indexed_runner(&kb, Arc::new(CountingEmbedder::default()), generator.clone()).await;
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let path = kb.path().join(Configuration::Retrieval.ledger_file_name());

    let mut ledger = Ledger::open(&path, false).unwrap();
    runner
        .run(Configuration::Retrieval, &queries[..5], &mut ledger)
        .await
        .unwrap();
    drop(ledger);

    let mut ledger = Ledger::open(&path, false).unwrap();
    let summary = runner.run(Configuration::Retrieval, &queries, &mut ledger).await.unwrap();

    assert_eq!(summary.processed, 5);
    assert_eq!(summary.skipped, 5);
    assert_eq!(generator.calls(), 10);

    let ids: Vec<String> = records(&path).into_iter().map(|r| r.query_id).collect();
    let expected: Vec<String> = (1..=10).map(|i| format!("q{:03}", i)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_answer_failure_is_isolated() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 3);
    let generator = Arc::new(FlakyGenerator::failing_on("question 2"));
    let runner = indexed_runner(&kb, Arc::new(CountingEmbedder::default()), generator).await;
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let path = kb.path().join(Configuration::Reasoning.ledger_file_name());

    let mut ledger = Ledger::open(&path, false).unwrap();
    let summary = runner.run(Configuration::Reasoning, &queries, &mut ledger).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);

    let results = records(&path);
    assert!(results[1].answer.starts_with("Error: "));
    assert!(results[1].error.is_some());
    assert!(results[1]
        .reasoning_steps
        .as_deref()
        .unwrap()
        .starts_with("Error during reasoning: "));
    assert_eq!(results[2].answer, "According to [Source 1], yes.");
    assert!(results[2].error.is_none());

    let report = validate_ledger(&path, Configuration::Reasoning).unwrap();
    assert!(report.is_ok());
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn test_rerank_failure_is_isolated() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 3);
    let generator = Arc::new(FlakyGenerator::reliable());
    let retrieval = engine_with_rerank_failure(
        &kb.path().join("embeddings_cache"),
        Arc::new(CountingEmbedder::default()),
        Some("question 1"),
    );
    let runner = ExperimentRunner::new(fast_config())
        .with_retrieval(Arc::new(retrieval))
        .with_generator(generator.clone());
    let documents = corpus::load_documents(kb.path()).unwrap();
    runner
        .index_corpus(MarkdownChunker::new().chunk_documents(&documents), 100)
        .await
        .unwrap();
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let path = kb.path().join(Configuration::Reasoning.ledger_file_name());

    let mut ledger = Ledger::open(&path, false).unwrap();
    let summary = runner.run(Configuration::Reasoning, &queries, &mut ledger).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(generator.calls(), 2);

    let results = records(&path);
    assert_eq!(results[0].query_id, "q001");
    assert!(results[0].answer.starts_with("Error: "));
    assert!(results[0].error.as_deref().unwrap().contains("model crashed"));
    assert!(results[0].retrieved_chunks.is_empty());
    assert!(results[0]
        .reasoning_steps
        .as_deref()
        .unwrap()
        .starts_with("Error during reasoning: "));

    for result in &results[1..] {
        assert!(result.error.is_none());
        assert_eq!(result.retrieved_chunks.len(), 2);
        assert_eq!(result.reasoning_steps.as_deref(), Some("Step 1: read [Source 1]"));
    }

    let report = validate_ledger(&path, Configuration::Reasoning).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems);
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn test_missing_collaborator_fails_before_any_query() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 2);
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let path = kb.path().join(Configuration::Rerank.ledger_file_name());
    let generator = Arc::new(FlakyGenerator::reliable());
    let runner = ExperimentRunner::new(fast_config()).with_generator(generator.clone());

    let mut ledger = Ledger::open(&path, false).unwrap();
    let err = runner
        .run(Configuration::Rerank, &queries, &mut ledger)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(generator.calls(), 0);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_dry_run_needs_no_providers() {
    let kb = TempDir::new().unwrap();
    write_kb(kb.path(), 2);
    let queries = corpus::load_queries(&kb.path().join("queries.jsonl")).unwrap();
    let runner = ExperimentRunner::new(RunnerConfig {
        dry_run: true,
        ..fast_config()
    });

    for configuration in Configuration::ALL {
        let path = kb.path().join(configuration.ledger_file_name());
        let mut ledger = Ledger::open(&path, true).unwrap();
        runner.run(configuration, &queries, &mut ledger).await.unwrap();

        let report = validate_ledger(&path, configuration).unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
        assert!(records(&path).iter().all(|r| r.dry_run && r.run_id == runner.run_id()));
    }
}
