//! Gemini configuration

use askba_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub(crate) const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub(crate) const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Configuration for the Gemini clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Separate credential for embeddings; the generation key is used when unset.
    pub embedding_api_key: Option<String>,
    pub api_url: String,
    pub embedding_model: String,
}

impl GeminiConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("ASKBA_GENERATION_API_KEY"))
            .map_err(|_| {
                Error::Configuration(
                    "GEMINI_API_KEY or ASKBA_GENERATION_API_KEY environment variable not found"
                        .to_string(),
                )
            })?;

        let embedding_api_key = env::var("ASKBA_EMBEDDING_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let api_url = env::var("GEMINI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let embedding_model = env::var("ASKBA_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        Ok(Self {
            api_key,
            embedding_api_key,
            api_url,
            embedding_model,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            embedding_api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Key used for embedding requests
    pub fn embedding_key(&self) -> &str {
        self.embedding_api_key.as_deref().unwrap_or(&self.api_key)
    }

    /// URL of a model method, e.g. `generateContent`
    pub(crate) fn model_url(&self, model_id: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.api_url.trim_end_matches('/'),
            bare_model_id(model_id),
            method
        )
    }
}

/// Model ids may be given with or without the `models/` resource prefix.
pub(crate) fn bare_model_id(model_id: &str) -> &str {
    model_id.strip_prefix("models/").unwrap_or(model_id)
}
