use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{Result, DroidlocError};
use crate::language::LanguageTag;
use super::TranslationProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchTranslation {
    translations: Vec<String>,
}

/// Translation provider backed by an Ollama server
pub struct OllamaProvider {
    client: Client,
    config: TranslateConfig,
}

impl OllamaProvider {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn ensure_supported(&self, language: LanguageTag) -> Result<()> {
        if self.config.supported_languages.is_empty()
            || self.config.supported_languages.contains(&language)
        {
            Ok(())
        } else {
            Err(DroidlocError::UnsupportedLanguage(format!(
                "{} is not enabled for model {}", language, self.config.model
            )))
        }
    }
}

#[async_trait]
impl TranslationProvider for OllamaProvider {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: LanguageTag,
        target: LanguageTag,
    ) -> Result<Vec<String>> {
        self.ensure_supported(target)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_batch_prompt(texts, source, target)?,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending {} texts ({} -> {}) to {}", texts.len(), source, target, url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DroidlocError::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_text));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DroidlocError::Translation(format!("Failed to parse response: {}", e)))?;

        debug!("Raw Ollama response: {}", generated.response);

        parse_translations(&generated.response).ok_or_else(|| {
            DroidlocError::Translation(format!(
                "Could not read translations from model output: {}",
                generated.response.trim()
            ))
        })
    }

    /// Check that the server is reachable and the model is pulled
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint.trim_end_matches('/'));

        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.config.model }))
            .send()
            .await
            .map_err(|e| DroidlocError::Network(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(DroidlocError::Translation(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.config.model, self.config.model
            )))
        }
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> DroidlocError {
    let detail = format!("Ollama API error {}: {}", status, body.trim());
    match status {
        StatusCode::TOO_MANY_REQUESTS => DroidlocError::RateLimit(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DroidlocError::Auth(detail),
        s if s.is_server_error() => DroidlocError::Network(detail),
        _ => DroidlocError::Translation(detail),
    }
}

/// Prompt asking for one translation per input, answered as a JSON object
pub fn build_batch_prompt(texts: &[String], source: LanguageTag, target: LanguageTag) -> Result<String> {
    let items = serde_json::to_string_pretty(texts)?;
    Ok(format!(
        "You are a professional translator localizing an Android application.\n\
         \n\
         CRITICAL: Translate every string from {} ({}) to {} ({}) ONLY.\n\
         Keep placeholders such as %1$s, %d and {{name}}, XML tags, and escape\n\
         sequences such as \\' and \\n exactly as they are.\n\
         \n\
         The input is a JSON array of {} strings. Return ONLY a JSON object\n\
         {{\"translations\": [...]}} holding exactly {} strings in the same order.\n\
         Do not include any explanations.\n\
         \n\
         [Strings to translate]\n\
         {}\n",
        source.english_name(),
        source.code(),
        target.english_name(),
        target.code(),
        texts.len(),
        texts.len(),
        items
    ))
}

/// Read the translation list out of model output, tolerating code fences and chatter
pub fn parse_translations(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<BatchTranslation>(raw) {
        return Some(parsed.translations);
    }
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return Some(list);
    }

    let unfenced = remove_code_fence(raw);
    if unfenced != raw {
        if let Ok(parsed) = serde_json::from_str::<BatchTranslation>(unfenced) {
            return Some(parsed.translations);
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<BatchTranslation>(&raw[start..=end])
        .ok()
        .map(|parsed| parsed.translations)
}

fn remove_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
