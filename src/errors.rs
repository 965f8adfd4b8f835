//! Error types for buddyrag
//!
//! Service-level failures surfaced by the orchestrator plus the ambient
//! failures of configuration, I/O and HTTP plumbing.

use thiserror::Error;

/// Main error type for the retrieval-and-cache subsystem
#[derive(Error, Debug)]
pub enum RagError {
    /// Retrieval index unreachable or timed out
    #[error("Retrieval unavailable: {reason}")]
    RetrievalUnavailable { reason: String },

    /// Language model failed twice with the same prompt
    #[error("Generation failed: {reason}")]
    GenerationFailure { reason: String },

    /// Pipeline state machine misuse
    #[error("Invalid pipeline transition from {from} via {event}")]
    InvalidTransition { from: String, event: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors (join failures, poisoned state)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for buddyrag operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn retrieval(reason: impl Into<String>) -> Self {
        RagError::RetrievalUnavailable {
            reason: reason.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        RagError::GenerationFailure {
            reason: reason.into(),
        }
    }

    /// Whether the failure came from one of the external services
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            RagError::RetrievalUnavailable { .. } | RagError::GenerationFailure { .. }
        )
    }
}

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Internal(err.to_string())
    }
}

impl From<toml::de::Error> for RagError {
    fn from(err: toml::de::Error) -> Self {
        RagError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RagError {
    fn from(err: toml::ser::Error) -> Self {
        RagError::Config(err.to_string())
    }
}
