//! Per-query state machine
//!
//! Every `(query, configuration)` pair moves through:
//! - Pending → Retrieving → Answering → Recorded
//! - any failure on the way → RecordedWithError
//!
//! The no-retrieval configuration skips Retrieving. Both recorded states
//! are terminal and accept no further events, so a pair cannot be
//! recorded twice within a run.

use crate::errors::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Query processing states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryState {
    /// Not yet started
    Pending,

    /// Embedding the query and searching the index
    Retrieving,

    /// Waiting on the answer generator
    Answering,

    /// Result appended to the ledger (terminal)
    Recorded,

    /// Error result appended to the ledger (terminal)
    RecordedWithError,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    /// Retrieval started
    StartRetrieval,

    /// Prompt handed to the answer generator
    StartAnswering,

    /// Successful result persisted
    Record,

    /// Error result persisted
    RecordError,
}

impl QueryState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Recorded | QueryState::RecordedWithError)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions (6 edges):
    /// 1. Pending    → Retrieving        (on: StartRetrieval)
    /// 2. Pending    → Answering         (on: StartAnswering)
    /// 3. Retrieving → Answering         (on: StartAnswering)
    /// 4. Retrieving → RecordedWithError (on: RecordError)
    /// 5. Answering  → Recorded          (on: Record)
    /// 6. Answering  → RecordedWithError (on: RecordError)
    pub fn transition(&self, event: QueryEvent) -> Result<QueryState> {
        use QueryEvent::*;
        use QueryState::*;

        let next_state = match (self, event) {
            // From Pending
            (Pending, StartRetrieval) => Retrieving,
            (Pending, StartAnswering) => Answering,

            // From Retrieving
            (Retrieving, StartAnswering) => Answering,
            (Retrieving, RecordError) => RecordedWithError,

            // From Answering
            (Answering, Record) => Recorded,
            (Answering, RecordError) => RecordedWithError,

            // Invalid transitions, including anything out of a terminal state
            (from, event) => {
                return Err(BenchError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: if from.is_terminal() {
                        "query already recorded".to_string()
                    } else {
                        format!("No valid transition from {:?} on {:?}", from, event)
                    },
                });
            }
        };

        Ok(next_state)
    }

    /// Get all valid events from this state
    pub fn valid_events(&self) -> Vec<QueryEvent> {
        use QueryEvent::*;
        use QueryState::*;

        match self {
            Pending => vec![StartRetrieval, StartAnswering],
            Retrieving => vec![StartAnswering, RecordError],
            Answering => vec![Record, RecordError],
            Recorded | RecordedWithError => vec![],
        }
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            QueryState::Pending => "Pending",
            QueryState::Retrieving => "Retrieving Context",
            QueryState::Answering => "Generating Answer",
            QueryState::Recorded => "Recorded",
            QueryState::RecordedWithError => "Recorded With Error",
        }
    }
}
