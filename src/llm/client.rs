//! Ollama API client
//!
//! Non-streaming completions via `POST /api/generate`. The active model can
//! be switched at runtime among the configured profiles.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use crate::config::{LlmConfig, ModelProfile};
use crate::errors::{RagError, Result};
use crate::llm::LanguageModel;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "gemma3:latest";

/// Temperature for models without a profile
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// A selectable model and its sampling settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub temperature: f64,
}

impl ModelInfo {
    fn from_profile(name: &str, profile: &ModelProfile) -> Self {
        Self {
            name: name.to_string(),
            display_name: profile.display_name.clone(),
            description: profile.description.clone(),
            temperature: profile.temperature,
        }
    }

    fn unprofiled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Ollama completion client; clones share the active model
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    profiles: BTreeMap<String, ModelProfile>,
    active: Arc<RwLock<ModelInfo>>,
}

impl OllamaClient {
    /// Create Ollama client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, Duration::from_secs(60))
    }

    /// Create Ollama client with custom configuration and the default model table
    pub fn with_config(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, model, timeout, LlmConfig::default().models)
    }

    /// Create Ollama client from the `[llm]` config section
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::build(
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
            config.models.clone(),
        )
    }

    fn build(
        base_url: &str,
        model: &str,
        timeout: Duration,
        profiles: BTreeMap<String, ModelProfile>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let active = match profiles.get(model) {
            Some(profile) => ModelInfo::from_profile(model, profile),
            None => ModelInfo::unprofiled(model),
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profiles,
            active: Arc::new(RwLock::new(active)),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn read_active(&self) -> RwLockReadGuard<'_, ModelInfo> {
        self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get current model name
    pub fn model(&self) -> String {
        self.read_active().name.clone()
    }

    pub fn current_model(&self) -> ModelInfo {
        self.read_active().clone()
    }

    /// Configured models, sorted by name
    pub fn available_models(&self) -> Vec<ModelInfo> {
        self.profiles
            .iter()
            .map(|(name, profile)| ModelInfo::from_profile(name, profile))
            .collect()
    }

    /// Make `name` the model for every following request.
    ///
    /// Requests already sent keep the model they were sent with.
    pub fn switch_model(&self, name: &str) -> Result<ModelInfo> {
        let profile = self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            RagError::Config(format!(
                "model {} is not configured (available: {})",
                name,
                known.join(", ")
            ))
        })?;

        let info = ModelInfo::from_profile(name, profile);
        let mut active = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if active.name != info.name {
            tracing::info!(from = %active.name, to = %info.name, "switched model");
        }
        *active = info.clone();
        Ok(info)
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let (model, temperature) = {
            let active = self.read_active();
            (active.name.clone(), active.temperature)
        };

        let request = OllamaGenerateRequest {
            model,
            prompt: prompt.to_string(),
            stream: false,
            options: Some(serde_json::json!({ "temperature": temperature })),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::generation(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::generation(format!("HTTP {}: {}", status, error_text)));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::generation(format!("Failed to parse response: {}", e)))?;

        Ok(body.response)
    }
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

/// Ollama generate response (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}
