//! Append-only results ledger
//!
//! One JSON object per line. On open, the `(query_id, experiment)` pairs
//! already present are loaded so a restarted run can skip them. Each
//! append is flushed and synced before it counts as done.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{BenchError, Result};
use crate::types::{Configuration, ExperimentResult};

/// Only the identity fields are needed to resume
#[derive(Deserialize)]
struct LedgerKey {
    query_id: String,
    experiment: Configuration,
}

/// Durable record of completed `(query, configuration)` pairs
pub struct Ledger {
    path: PathBuf,
    file: File,
    completed: HashSet<(String, Configuration)>,
}

impl Ledger {
    /// Open the ledger at `path`.
    ///
    /// With `overwrite`, existing content is discarded; otherwise it is
    /// scanned for completed pairs. Malformed lines are skipped.
    pub fn open(path: impl Into<PathBuf>, overwrite: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        if overwrite {
            File::create(&path)?;
            info!(path = %path.display(), "truncated results ledger");
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let mut completed = HashSet::new();
        let mut skipped = 0usize;
        for (line_no, line) in String::from_utf8_lossy(&contents).lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerKey>(line) {
                Ok(key) => {
                    completed.insert((key.query_id, key.experiment));
                }
                Err(e) => {
                    skipped += 1;
                    warn!(path = %path.display(), line = line_no + 1, error = %e, "skipping malformed ledger line");
                }
            }
        }

        // A torn final line must not swallow the next append
        if contents.last().is_some_and(|b| *b != b'\n') {
            file.write_all(b"\n")?;
            file.flush()?;
        }

        info!(
            path = %path.display(),
            completed = completed.len(),
            skipped,
            "opened results ledger"
        );

        Ok(Self {
            path,
            file,
            completed,
        })
    }

    /// Whether a result for this pair is already recorded
    pub fn contains(&self, query_id: &str, configuration: Configuration) -> bool {
        self.completed.contains(&(query_id.to_string(), configuration))
    }

    /// Validate, write, flush and sync one result.
    ///
    /// A pair already present is rejected so no pair is recorded twice.
    pub fn append(&mut self, result: &ExperimentResult) -> Result<()> {
        result.validate()?;
        let key = result.key();
        if self.completed.contains(&key) {
            return Err(BenchError::DataError(format!(
                "{} result for {} already recorded",
                key.1, key.0
            )));
        }

        let mut line = serde_json::to_string(result)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;

        debug!(query_id = %key.0, configuration = %key.1, "appended result");
        self.completed.insert(key);
        Ok(())
    }

    /// Number of recorded pairs
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One ledger line as read back for inspection
#[derive(Debug)]
pub enum LedgerLine {
    Record(Box<ExperimentResult>),
    Malformed { line: usize, error: String },
}

/// Read every non-blank line of a ledger file
pub fn read_ledger(path: &Path) -> Result<Vec<LedgerLine>> {
    let file = File::open(path)?;
    let mut lines = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push(match serde_json::from_str::<ExperimentResult>(&line) {
            Ok(record) => LedgerLine::Record(Box::new(record)),
            Err(e) => LedgerLine::Malformed {
                line: line_no + 1,
                error: e.to_string(),
            },
        });
    }

    Ok(lines)
}
