//! Language model service
//!
//! The orchestrator only sees the `LanguageModel` trait; `OllamaClient` is
//! the production implementation.

pub mod client;

pub use client::{ModelInfo, OllamaClient, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_TEMPERATURE};

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::{RagError, Result};

/// Stateless text generation service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Drop any short-term memory the backend keeps for a session
    async fn forget_session(&self, _session_id: &str) {}
}

/// Generate with a per-attempt timeout, retrying once with the identical prompt
pub async fn generate_with_retry(
    model: &dyn LanguageModel,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    let mut last_error = None;

    for attempt in 1..=2 {
        match tokio::time::timeout(timeout, model.generate(prompt)).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => {
                tracing::warn!(attempt, error = %e, "generation attempt failed");
                last_error = Some(e.to_string());
            }
            Err(_) => {
                tracing::warn!(attempt, timeout_ms = timeout.as_millis() as u64, "generation attempt timed out");
                last_error = Some(format!("timed out after {}ms", timeout.as_millis()));
            }
        }
    }

    Err(RagError::generation(
        last_error.unwrap_or_else(|| "unknown failure".to_string()),
    ))
}
