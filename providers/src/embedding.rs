//! Embedding providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{ProviderError, Result};
use crate::ollama::{self, OllamaConfig};

/// Trait for embedding providers.
///
/// Implementations must be deterministic enough that the same text embedded
/// at ingestion time and at query time lands in the same vector space.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model the vectors come from.
    fn model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Check that the provider is reachable and the model is available.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Embedding,
}

/// Embedding provider backed by Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaConfig,
}

impl OllamaEmbedder {
    /// Create a new embedder for the configured server and model.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.config.embed_model.as_str();
        let response = self
            .client
            .post(self.config.endpoint("api/embeddings"))
            .json(&EmbedRequest {
                model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| ollama::transport_error(e, &self.config.base_url))?;

        let response = ollama::check_status(response, model).await?;
        let body: EmbedResponse = response.json().await?;

        if body.embedding.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "model {model} returned an empty embedding"
            )));
        }

        debug!(
            "Embedded {} chars into {} dimensions",
            text.chars().count(),
            body.embedding.len()
        );
        Ok(body.embedding)
    }

    async fn health_check(&self) -> Result<()> {
        let installed = ollama::list_models(&self.client, &self.config).await?;
        if ollama::model_installed(&installed, &self.config.embed_model) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotFound(self.config.embed_model.clone()))
        }
    }
}
