//! Command-line argument parsing for ragbench
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::Configuration;

/// ragbench - Run retrieval-augmented generation experiments over a knowledge base
#[derive(Parser, Debug)]
#[command(name = "ragbench")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version = "0.3.0")]
#[command(about = "Resumable E1-E4 RAG experiment runner", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no progress bars, summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the corpus and run the selected configurations in order
    Run {
        /// Only these configurations (e.g. E1,E3)
        #[arg(long, value_delimiter = ',')]
        only: Vec<Configuration>,

        /// Truncate existing ledgers instead of resuming
        #[arg(long)]
        overwrite: bool,

        /// Record placeholder results without any remote call
        #[arg(long)]
        dry_run: bool,

        /// Knowledge base directory
        #[arg(long)]
        kb_dir: Option<PathBuf>,
    },

    /// Chunk and embed the corpus, warming the chunk cache
    Index {
        /// Knowledge base directory
        #[arg(long)]
        kb_dir: Option<PathBuf>,
    },

    /// Print chunk ids and spans for one document
    Chunk {
        /// Markdown file to chunk
        file: PathBuf,
    },

    /// Check the four result ledgers
    Validate {
        /// Knowledge base directory
        #[arg(long)]
        kb_dir: Option<PathBuf>,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Commands {
    /// Configurations a `run` should execute, in E1..E4 order
    pub fn selected_configurations(only: &[Configuration]) -> Vec<Configuration> {
        Configuration::ALL
            .into_iter()
            .filter(|c| only.is_empty() || only.contains(c))
            .collect()
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "ragbench=debug,info",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        let args = Args::parse_from(["ragbench", "-q", "config"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);

        let args = Args::parse_from(["ragbench", "config"]);
        assert_eq!(args.verbosity(), Verbosity::Normal);

        let args = Args::parse_from(["ragbench", "-vv", "config"]);
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_run_flags() {
        let args = Args::parse_from([
            "ragbench",
            "run",
            "--only",
            "E1,e3",
            "--dry-run",
            "--kb-dir",
            "output/kb_test",
        ]);
        match args.command {
            Commands::Run {
                only,
                overwrite,
                dry_run,
                kb_dir,
            } => {
                assert_eq!(only, vec![Configuration::NoRetrieval, Configuration::Rerank]);
                assert!(!overwrite);
                assert!(dry_run);
                assert_eq!(kb_dir, Some(PathBuf::from("output/kb_test")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_configuration_rejected() {
        assert!(Args::try_parse_from(["ragbench", "run", "--only", "E9"]).is_err());
    }

    #[test]
    fn test_selected_configurations_keep_order() {
        let selected =
            Commands::selected_configurations(&[Configuration::Reasoning, Configuration::NoRetrieval]);
        assert_eq!(selected, vec![Configuration::NoRetrieval, Configuration::Reasoning]);
        assert_eq!(Commands::selected_configurations(&[]).len(), 4);
    }

    #[test]
    fn test_verbosity_as_str() {
        assert_eq!(Verbosity::Quiet.as_str(), "quiet");
        assert_eq!(Verbosity::VeryVerbose.as_str(), "very_verbose");
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());
    }
}
