//! Embedding interface and the rig-core OpenAI adapter behind it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;
use secrecy::ExposeSecret;

use crate::error::RetrievalError;

/// Text embedding provider. The index depends on this trait only; tests
/// inject deterministic fakes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

/// Configuration for the embedding service.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Bound on a single outbound embedding call.
    pub timeout: Duration,
}

/// Adapter bridging rig-core's `EmbeddingModel` to our `Embedder` trait.
pub struct RigEmbedder<M: EmbeddingModel> {
    model: M,
    timeout: Duration,
}

#[async_trait]
impl<M: EmbeddingModel> Embedder for RigEmbedder<M> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let documents: Vec<String> = texts.to_vec();
        let embeddings = tokio::time::timeout(self.timeout, self.model.embed_texts(documents))
            .await
            .map_err(|_| RetrievalError::Timeout {
                timeout: self.timeout,
            })?
            .map_err(|e| RetrievalError::EmbeddingFailed {
                reason: e.to_string(),
            })?;

        Ok(embeddings
            .into_iter()
            .map(|e| e.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

/// Create an OpenAI-backed embedder (the knowledge base embedding service).
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, RetrievalError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            RetrievalError::EmbeddingFailed {
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.embedding_model(&config.model);
    tracing::info!("Using OpenAI embeddings (model: {})", config.model);
    Ok(Arc::new(RigEmbedder {
        model,
        timeout: config.timeout,
    }))
}
