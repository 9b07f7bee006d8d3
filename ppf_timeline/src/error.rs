//! Error taxonomy for the timeline core.
//!
//! None of these cross a component boundary for expected conditions: a
//! `NotFound` is turned into "keep the last pose" by the projector, a
//! `MisconfiguredDependency` into a logged, degraded default.

use ppf_env::EntityId;
use thiserror::Error;

/// Errors produced by the timeline core.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Query against an untracked entity or an empty history
    #[error("No snapshot for entity {entity}")]
    NotFound { entity: EntityId },

    /// A required collaborator (recorder, render layer) is missing
    #[error("Misconfigured dependency: {0}")]
    MisconfiguredDependency(String),

    /// A second recorder was requested while one is active
    #[error("A recorder is already active for this session")]
    DuplicateSingleton,

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A deferred operation ran out of attempts before its target appeared
    #[error("Deferred operation for {key} timed out after {attempts} attempts")]
    DeferredTimeout { key: String, attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimelineError {
    /// Creates a misconfigured-dependency error.
    pub fn misconfigured(msg: impl Into<String>) -> Self {
        Self::MisconfiguredDependency(msg.into())
    }

    /// Creates an invalid-config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for the "nothing recorded yet" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
