//! Knowledge-base and query loading
//!
//! Documents are the `*.md` files of a directory in sorted order; queries
//! are a JSONL file with one `QueryRecord` per line.

use std::path::Path;
use tracing::{info, warn};

use crate::errors::{BenchError, Result};
use crate::types::{Document, QueryRecord};

/// Files in the knowledge-base directory that are not part of the corpus
const SKIPPED_FILES: &[&str] = &["README.md", "structure.md"];

/// Load every markdown document in `kb_dir`, sorted by file name
pub fn load_documents(kb_dir: &Path) -> Result<Vec<Document>> {
    let entries = std::fs::read_dir(kb_dir).map_err(|e| {
        BenchError::ConfigError(format!(
            "Failed to read knowledge base directory {}: {}",
            kb_dir.display(),
            e
        ))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_markdown = path.extension().map(|ext| ext == "md").unwrap_or(false);
        let skipped = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| SKIPPED_FILES.contains(&name))
            .unwrap_or(true);
        if path.is_file() && is_markdown && !skipped {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(&path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(Document::new(filename, String::from_utf8_lossy(&bytes)));
    }

    info!(count = documents.len(), dir = %kb_dir.display(), "loaded documents");
    Ok(documents)
}

/// Load queries from a JSONL file.
///
/// Malformed lines and lines without a query id are skipped. It is an
/// error when the file has content but no valid query.
pub fn load_queries(path: &Path) -> Result<Vec<QueryRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BenchError::ConfigError(format!("Failed to read queries file {}: {}", path.display(), e))
    })?;

    let mut queries = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<QueryRecord>(line) {
            Ok(record) if !record.query_id.trim().is_empty() => queries.push(record),
            Ok(_) => {
                skipped += 1;
                warn!(line = line_no + 1, "skipping query with empty query_id");
            }
            Err(e) => {
                skipped += 1;
                warn!(line = line_no + 1, error = %e, "skipping malformed query line");
            }
        }
    }

    if queries.is_empty() && skipped > 0 {
        return Err(BenchError::DataError(format!(
            "no valid queries in {} ({} malformed lines)",
            path.display(),
            skipped
        )));
    }

    info!(count = queries.len(), skipped, "loaded queries");
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_documents_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b_returns.md"), "# Returns\n30 days").unwrap();
        std::fs::write(dir.path().join("a_shipping.md"), "# Shipping\n2 days").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignore me").unwrap();
        std::fs::write(dir.path().join("structure.md"), "ignore me").unwrap();
        std::fs::write(dir.path().join("queries.jsonl"), "{}").unwrap();

        let docs = load_documents(dir.path()).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a_shipping.md", "b_returns.md"]);
        assert_eq!(docs[0].raw_text, "# Shipping\n2 days");
    }

    #[test]
    fn test_load_documents_missing_dir_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = load_documents(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BenchError::ConfigError(_)));
    }

    #[test]
    fn test_load_queries_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"query_id\":\"q1\",\"query\":\"Hours?\",\"ground_truth\":\"9-5\"}\n",
                "not json\n",
                "\n",
                "{\"query_id\":\"\",\"query\":\"blank id\"}\n",
                "{\"query_id\":\"q2\",\"query_text\":\"Returns?\",\"ground_truth\":\"30 days\"}\n",
            ),
        )
        .unwrap();

        let queries = load_queries(&path).unwrap();
        let ids: Vec<_> = queries.iter().map(|q| q.query_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(queries[1].query, "Returns?");
    }

    #[test]
    fn test_load_queries_all_invalid_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.jsonl");
        std::fs::write(&path, "garbage\n{also garbage\n").unwrap();
        assert!(matches!(load_queries(&path), Err(BenchError::DataError(_))));
    }

    #[test]
    fn test_load_queries_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queries.jsonl");
        std::fs::write(&path, "").unwrap();
        assert!(load_queries(&path).unwrap().is_empty());
    }
}
