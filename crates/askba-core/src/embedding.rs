//! Embedding provider trait

use async_trait::async_trait;

use crate::Result;

/// Trait for remote embedding services
///
/// The same provider (and model) must embed both the corpus and the queries,
/// otherwise similarities are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the embedding model
    fn model_id(&self) -> &str;
}
