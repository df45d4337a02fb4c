//! Gemini embedding client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use askba_core::{EmbeddingProvider, Error, Result};

use crate::client::{check_status, http_client};
use crate::config::{bare_model_id, GeminiConfig};

/// Upper bound on texts per `batchEmbedContents` request
const MAX_BATCH: usize = 100;

/// Gemini embedding client
pub struct GeminiEmbedder {
    config: GeminiConfig,
    client: Client,
    model: String,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// Create an embedder for the model named in the configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let model = bare_model_id(&config.embedding_model).to_string();
        Ok(Self {
            config,
            client: http_client()?,
            model,
        })
    }

    fn build_request(&self, texts: &[String]) -> BatchEmbedRequest {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.model),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                })
                .collect(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.config.model_url(&self.model, "batchEmbedContents");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.embedding_key())
            .json(&self.build_request(texts))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let response = check_status(response, &self.model).await?;
        let body: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Serialization(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            debug!(model = %self.model, batch = batch.len(), "Embedding batch");
            vectors.extend(self.embed_batch(batch).await?);
        }

        Ok(vectors)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_request_shape() {
        let mut config = GeminiConfig::new("test_key".to_string());
        config.embedding_model = "models/text-embedding-004".to_string();
        let embedder = GeminiEmbedder::new(config).unwrap();

        assert_eq!(embedder.model_id(), "text-embedding-004");

        let request = embedder.build_request(&["first".to_string(), "second".to_string()]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"].as_array().unwrap().len(), 2);
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "second");
    }
}
