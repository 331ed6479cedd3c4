//! Configuration types.
//!
//! Everything is read once in `AppConfig::from_env()` and handed to the
//! components that need it. There is no ambient settings global.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP API binds to.
    pub http_bind: String,
    /// Path to the local libSQL database file.
    pub db_path: String,
    /// OpenRouter API key.
    pub openrouter_api_key: SecretString,
    /// OpenRouter base URL.
    pub openrouter_base_url: String,
    /// Model identifier sent with each chat completion.
    pub model: String,
    /// Sampling temperature (deterministic-leaning).
    pub temperature: f32,
    /// Output token budget per call.
    pub max_tokens: u32,
    /// Wall-clock timeout for a single model call.
    pub request_timeout: Duration,
    /// Sender allowlist for the raw intake surface. Empty allows everyone.
    pub allowed_senders: Vec<String>,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let http_bind =
            std::env::var("MAIL_DIGEST_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let db_path = std::env::var("MAIL_DIGEST_DB_PATH")
            .unwrap_or_else(|_| "./data/mail-digest.db".to_string());

        let openrouter_base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());

        let model = std::env::var("MAIL_DIGEST_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-3-haiku".to_string());

        let request_timeout_secs: u64 = std::env::var("MAIL_DIGEST_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let allowed_senders: Vec<String> = std::env::var("MAIL_DIGEST_ALLOWED_SENDERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            http_bind,
            db_path,
            openrouter_api_key,
            openrouter_base_url,
            model,
            temperature: 0.3,
            max_tokens: 2000,
            request_timeout: Duration::from_secs(request_timeout_secs),
            allowed_senders,
        })
    }
}
