//! Shared plumbing for the Ollama HTTP API.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Default address of a locally running Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Connection settings for an Ollama server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the server.
    pub base_url: String,

    /// Model used for embeddings.
    pub embed_model: String,

    /// Model used for chat completion.
    pub chat_model: String,

    /// Sampling temperature passed to the chat model.
    pub temperature: Option<f32>,

    /// Upper bound for a whole HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.1:8b".to_string(),
            temperature: None,
            request_timeout_secs: 300,
            connect_timeout_secs: 5,
        }
    }
}

impl OllamaConfig {
    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .build()?;
        Ok(client)
    }
}

/// Turn a non-success response into the matching [`ProviderError`].
pub(crate) async fn check_status(response: Response, model: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::ModelNotFound(model.to_string()));
    }

    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Map a transport failure to a provider error, treating refused connections
/// as the server being down.
pub(crate) fn transport_error(err: reqwest::Error, base_url: &str) -> ProviderError {
    if err.is_connect() {
        ProviderError::Unavailable(format!("cannot connect to {base_url}: {err}"))
    } else {
        ProviderError::Http(err)
    }
}

/// Check that the server answers and list the installed models.
pub(crate) async fn list_models(client: &Client, config: &OllamaConfig) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct TagsResponse {
        #[serde(default)]
        models: Vec<TagModel>,
    }

    #[derive(Deserialize)]
    struct TagModel {
        name: String,
    }

    let response = client
        .get(config.endpoint("api/tags"))
        .send()
        .await
        .map_err(|e| transport_error(e, &config.base_url))?;
    let response = check_status(response, "").await?;
    let tags: TagsResponse = response.json().await?;

    let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
    debug!("Ollama reports {} installed models", models.len());
    Ok(models)
}

/// Whether `wanted` names one of `installed`, allowing the implicit `:latest` tag.
pub(crate) fn model_installed(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|name| {
        name == wanted || name.strip_suffix(":latest").is_some_and(|base| base == wanted)
    })
}
