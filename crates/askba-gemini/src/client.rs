//! Gemini generation client implementation

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use askba_core::{
    Error, GenerationConfig, GenerationResult, LLMProvider, PromptSpec, Result,
};

use crate::config::{bare_model_id, GeminiConfig};

/// Gemini generation client
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: RequestContent,
    contents: Vec<RequestContent>,
    generation_config: GenerationParams,
}

#[derive(Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

impl GeminiClient {
    /// Model constants
    pub const GEMINI_1_5_PRO: &'static str = "gemini-1.5-pro";
    pub const GEMINI_1_5_FLASH: &'static str = "gemini-1.5-flash";

    /// Create a new Gemini client from configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }

    /// Create a new Gemini client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = GeminiConfig::from_env()?;
        Self::new(config)
    }

    fn build_request(prompt: &PromptSpec, config: &GenerationConfig) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: RequestContent {
                role: None,
                parts: vec![RequestPart {
                    text: prompt.system_instruction.clone(),
                }],
            },
            contents: vec![RequestContent {
                role: Some("user".to_string()),
                parts: vec![RequestPart {
                    text: prompt.user_content(),
                }],
            }],
            generation_config: GenerationParams {
                max_output_tokens: config.max_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                stop_sequences: config.stop_sequences.clone(),
            },
        }
    }

    /// Extract the answer text from a `generateContent` response body
    fn parse_response(body: &str, model_id: &str) -> Result<GenerationResult> {
        let response: GenerateContentResponse = serde_json::from_str(body)?;

        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(Error::LLMProvider(format!("Prompt blocked by Gemini: {}", reason)));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::LLMProvider("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::LLMProvider(format!(
                "Empty response from Gemini (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(GenerationResult {
            text,
            model_id: bare_model_id(model_id).to_string(),
            tokens_used: response.usage_metadata.and_then(|u| u.total_token_count),
            finish_reason: candidate.finish_reason,
        })
    }

    /// Perform the actual generation request
    async fn perform_generation(
        &self,
        prompt: &PromptSpec,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let url = self.config.model_url(&config.model_id, "generateContent");
        let request_body = Self::build_request(prompt, config);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let response = check_status(response, &config.model_id).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::parse_response(&body, &config.model_id)
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate(&self, prompt: &PromptSpec, config: &GenerationConfig) -> Result<GenerationResult> {
        let generation_future = self.perform_generation(prompt, config);

        match timeout(config.timeout, generation_future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} did not answer within {}s",
                config.model_id,
                config.timeout.as_secs()
            ))),
        }
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(|e| Error::Network(e.to_string()))
}

/// Map non-success HTTP statuses onto the error taxonomy
pub(crate) async fn check_status(response: Response, model_id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(format!("{}: {}", model_id, error_text)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authentication(format!("Gemini rejected the API key ({})", status))
        }
        _ => Error::LLMProvider(format!(
            "Gemini request for {} failed with status {}: {}",
            model_id, status, error_text
        )),
    })
}
