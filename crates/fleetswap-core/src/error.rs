//! Error taxonomy for deploy operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors reported by a cloud collaborator.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Throttling or eventual-consistency lag; safe to retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("provider call failed: {0}")]
    Api(String),

    #[error("operation not supported by provider: {0}")]
    Unsupported(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Errors surfaced by the deploy lifecycle.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The operation cannot start against the current role state.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Role/tag state is ambiguous or contradictory.
    #[error("resource integrity violation: {0}")]
    Integrity(String),

    #[error("monitoring config check failed on {host}: {detail}")]
    ConfigCheck { host: String, detail: String },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("not enough free elastic addresses: need {needed}, have {available}")]
    InsufficientAddresses { needed: usize, available: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state store error: {0:#}")]
    State(#[from] anyhow::Error),
}

impl DeployError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        DeployError::Precondition(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        DeployError::Integrity(msg.into())
    }

    /// Whether the error may clear up on its own if the call is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeployError::Provider(e) if e.is_transient())
    }
}

/// Result type for deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;
