// Experiment runner: per-query state machine and resumable run loop
pub mod experiment;
pub mod state;

pub use experiment::{
    remaining_delay, ExperimentRunner, RunSummary, RunnerConfig, DEFAULT_REQUEST_INTERVAL,
};
pub use state::{QueryEvent, QueryState};
