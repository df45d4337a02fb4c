//! LLM provider trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{PromptSpec, Verbosity};
use crate::Result;

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

impl GenerationConfig {
    /// Generation settings suited to one answer length
    pub fn for_verbosity(model_id: impl Into<String>, verbosity: Verbosity) -> Self {
        let (max_tokens, temperature) = match verbosity {
            Verbosity::Short => (256, 0.2),
            Verbosity::Detailed => (2048, 0.4),
        };

        Self {
            model_id: model_id.into(),
            max_tokens,
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "gemini-1.5-pro".to_string(),
            max_tokens: 1024,
            temperature: None,
            top_p: Some(0.95),
            top_k: Some(40),
            stop_sequences: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a text generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

/// Trait for LLM providers (e.g., Gemini)
///
/// A provider performs exactly one generation request against the model named
/// in the config. Retrying and falling back to other models is the caller's
/// concern, so implementations must not loop internally.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text for a prompt with the given configuration
    async fn generate(&self, prompt: &PromptSpec, config: &GenerationConfig) -> Result<GenerationResult>;

    /// Short name used in logs
    fn provider_name(&self) -> &str;
}
