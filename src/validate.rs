//! Ledger validation
//!
//! Post-run consistency check over a results file: every line parses,
//! belongs to the expected configuration, carries reasoning where the
//! configuration requires it, and appears once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::ledger::{read_ledger, LedgerLine};
use crate::types::Configuration;

/// Findings for one ledger file
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReport {
    pub path: PathBuf,
    pub configuration: Configuration,
    /// Non-blank lines
    pub lines: usize,
    /// Records whose answer is an error
    pub errors: usize,
    pub problems: Vec<String>,
}

impl LedgerReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check the ledger at `path` against `configuration`.
///
/// Problems are collected, not raised; only unreadable files are errors.
pub fn validate_ledger(path: &Path, configuration: Configuration) -> Result<LedgerReport> {
    let mut report = LedgerReport {
        path: path.to_path_buf(),
        configuration,
        lines: 0,
        errors: 0,
        problems: Vec::new(),
    };

    if !path.exists() {
        report.problems.push(format!("{} does not exist", path.display()));
        return Ok(report);
    }

    let lines = read_ledger(path)?;
    report.lines = lines.len();
    if lines.is_empty() {
        report.problems.push(format!("{} is empty", path.display()));
        return Ok(report);
    }

    let mut seen = HashSet::new();
    for line in lines {
        let record = match line {
            LedgerLine::Record(record) => record,
            LedgerLine::Malformed { line, error } => {
                report.problems.push(format!("line {}: {}", line, error));
                continue;
            }
        };

        if record.configuration != configuration {
            report.problems.push(format!(
                "{}: tagged {}, expected {}",
                record.query_id, record.configuration, configuration
            ));
        }
        if configuration.expects_reasoning() && record.reasoning_steps.is_none() {
            report
                .problems
                .push(format!("{}: missing reasoning_steps", record.query_id));
        }
        if !seen.insert(record.key()) {
            report.problems.push(format!(
                "{}: duplicate {} record",
                record.query_id, record.configuration
            ));
        }
        if record.is_error() {
            report.errors += 1;
        }
    }

    Ok(report)
}
