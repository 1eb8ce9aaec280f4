use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, DroidlocError};
use crate::language::LanguageTag;

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Locale the project's default `values/strings.xml` is written in
    pub source_language: LanguageTag,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Languages the provider accepts; empty means no restriction
    #[serde(default)]
    pub supported_languages: Vec<LanguageTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on languages translated at the same time
    pub max_concurrency: usize,
    /// Total provider attempts per language, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on every further retry
    pub initial_backoff_ms: u64,
    /// Ceiling for the retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            source_language: LanguageTag::English,
            timeout_secs: default_timeout_secs(),
            supported_languages: Vec::new(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DroidlocError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| DroidlocError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DroidlocError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DroidlocError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_concurrency == 0 {
            return Err(DroidlocError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.orchestrator.max_attempts == 0 {
            return Err(DroidlocError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.translate.endpoint.trim().is_empty() {
            return Err(DroidlocError::Config("translate.endpoint is empty".to_string()));
        }
        Ok(())
    }
}
