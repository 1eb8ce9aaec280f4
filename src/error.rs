use thiserror::Error;

#[derive(Error, Debug)]
pub enum DroidlocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Resource parse error: {0}")]
    Parse(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited by translation provider: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected by translation provider: {0}")]
    Auth(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Provider returned {actual} translations for {expected} inputs")]
    ProviderContractViolation { expected: usize, actual: usize },

    #[error("Resource file has no text to translate")]
    NothingToTranslate,

    #[error("Translation cancelled")]
    Cancelled,

    #[error("Invalid translation job: {0}")]
    InvalidJob(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DroidlocError {
    /// Whether a failed provider call may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, DroidlocError>;
