use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{RagError, Result};
use crate::prompt::PromptTemplate;

/// Upper bound for every configured duration (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Wall-clock span for a configured number of seconds, saturating on overflow
pub fn span_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub prompt: PromptTemplate,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Language model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub url: String,
    /// Active model; must be a key of `models`
    pub model: String,
    /// Per-call timeout; the orchestrator retries a failed call once
    pub timeout_secs: u64,
    /// Models that can be selected at runtime
    pub models: BTreeMap<String, ModelProfile>,
}

/// Sampling settings and description of one selectable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub temperature: f64,
}

impl ModelProfile {
    fn new(display_name: &str, description: &str, temperature: f64) -> Self {
        Self {
            display_name: display_name.to_string(),
            description: description.to_string(),
            temperature,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "gemma3:latest".to_string(),
            ModelProfile::new("Gemma 3", "Balanced performance, good for general questions", 0.3),
        );
        models.insert(
            "llama3.2:latest".to_string(),
            ModelProfile::new("Llama 3.2", "Careful reasoning and longer answers", 0.2),
        );

        Self {
            url: crate::llm::DEFAULT_OLLAMA_URL.to_string(),
            model: crate::llm::DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            models,
        }
    }
}

impl LlmConfig {
    /// Profile of the active model
    pub fn active_profile(&self) -> Option<&ModelProfile> {
        self.models.get(&self.model)
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(RagError::Config("llm.models must list at least one model".to_string()));
        }
        if self.active_profile().is_none() {
            let known: Vec<&str> = self.models.keys().map(String::as_str).collect();
            return Err(RagError::Config(format!(
                "llm.model {} is not one of llm.models ({})",
                self.model,
                known.join(", ")
            )));
        }
        if let Some((name, profile)) = self
            .models
            .iter()
            .find(|(_, p)| !(0.0..=2.0).contains(&p.temperature))
        {
            return Err(RagError::Config(format!(
                "llm.models.{} temperature must be within [0, 2], got {}",
                name, profile.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub timeout_secs: u64,
    /// Category -> trigger keywords. A first-attempt search is narrowed to the
    /// categories whose keywords appear in the query.
    pub category_routes: BTreeMap<String, Vec<String>>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let mut category_routes = BTreeMap::new();
        category_routes.insert(
            "Financial".to_string(),
            ["tuition", "fee", "cost", "payment", "financial", "price", "charge", "pay"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );

        Self {
            top_k: 8,
            timeout_secs: 10,
            category_routes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keyword overlap a new query must exceed to keep the cache
    pub relatedness_threshold: f32,
    pub expiry_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            relatedness_threshold: 0.30,
            expiry_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum average keyword coverage for a batch of passages
    pub threshold: f32,
    /// Confidence reported for general-knowledge answers
    pub fallback_confidence: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            fallback_confidence: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_turns: usize,
    /// Turns shown to the rewriter
    pub rewrite_window: usize,
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            rewrite_window: 3,
            idle_timeout_secs: 30 * 60,
            reap_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Questions up to this many words with no content keyword are follow-ups
    pub short_question_words: usize,
    /// Pronoun questions with at most this many content keywords are follow-ups
    pub pronoun_keyword_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            short_question_words: 4,
            pronoun_keyword_limit: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing the defaults there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        Self::load_from(path)
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".buddyrag").join("config.toml"))
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.cache.relatedness_threshold) {
            return Err(RagError::Config(format!(
                "cache.relatedness_threshold must be within [0, 1], got {}",
                self.cache.relatedness_threshold
            )));
        }
        if !unit.contains(&self.validator.threshold) {
            return Err(RagError::Config(format!(
                "validator.threshold must be within [0, 1], got {}",
                self.validator.threshold
            )));
        }
        if !unit.contains(&self.validator.fallback_confidence) {
            return Err(RagError::Config(format!(
                "validator.fallback_confidence must be within [0, 1], got {}",
                self.validator.fallback_confidence
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.session.max_turns == 0 {
            return Err(RagError::Config("session.max_turns must be positive".to_string()));
        }
        if self.llm.timeout_secs == 0 || self.retrieval.timeout_secs == 0 {
            return Err(RagError::Config("timeouts must be positive".to_string()));
        }
        if self.session.reap_interval_secs == 0 {
            return Err(RagError::Config(
                "session.reap_interval_secs must be positive".to_string(),
            ));
        }

        let durations = [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("retrieval.timeout_secs", self.retrieval.timeout_secs),
            ("cache.expiry_secs", self.cache.expiry_secs),
            ("session.idle_timeout_secs", self.session.idle_timeout_secs),
            ("session.reap_interval_secs", self.session.reap_interval_secs),
        ];
        if let Some((name, value)) = durations.iter().find(|(_, v)| *v > MAX_DURATION_SECS) {
            return Err(RagError::Config(format!(
                "{} must be at most {} seconds, got {}",
                name, MAX_DURATION_SECS, value
            )));
        }

        self.llm.validate()
    }
}
