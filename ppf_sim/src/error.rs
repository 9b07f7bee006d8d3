//! Error types for the simulation harness.

use ppf_env::EnvError;
use ppf_timeline::TimelineError;
use thiserror::Error;

/// Errors that can occur while building or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
