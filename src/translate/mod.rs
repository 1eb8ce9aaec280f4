// Pluggable translation providers
//
// The orchestrator only sees the TranslationProvider trait; concrete
// providers are built by the factory from configuration:
// - Ollama: local or remote LLM served through the Ollama generate API

pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::language::LanguageTag;

pub use ollama::OllamaProvider;

/// Translates a batch of texts into one target language
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Returns one translation per input text, in input order.
    ///
    /// Errors: `RateLimit` and `Network` are transient, `Auth` and
    /// `UnsupportedLanguage` are not.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: LanguageTag,
        target: LanguageTag,
    ) -> Result<Vec<String>>;

    /// Verify the provider can be reached before a job starts
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating translation provider instances
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider described by the configuration
    pub fn create(config: TranslateConfig) -> Result<Arc<dyn TranslationProvider>> {
        Ok(Arc::new(OllamaProvider::new(config)?))
    }
}
