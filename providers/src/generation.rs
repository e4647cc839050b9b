//! Answer generation providers.
//!
//! A generation provider turns a list of chat messages into an answer, either
//! in one piece or as a stream of text fragments.

use std::pin::Pin;

use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, Result};
use crate::ollama::{self, OllamaConfig};

/// Stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A complete prompt for one generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Ordered chat messages.
    pub messages: Vec<ChatMessage>,

    /// Overrides the provider's default temperature.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request from messages.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for answer generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model answering the prompt.
    fn model(&self) -> &str;

    /// Generate a complete answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate an answer as a stream of text fragments.
    ///
    /// The default implementation yields the complete answer as one fragment.
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        let answer = self.generate(request).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(answer) })))
    }

    /// Check that the provider is reachable and the model is available.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// One line of an Ollama chat response.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Parse one NDJSON line into its text fragment, if it carries any.
fn parse_chunk_line(line: &[u8]) -> Result<Option<String>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: ChatChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::InvalidResponse(error));
    }
    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

/// Generation provider backed by Ollama's `/api/chat` endpoint.
pub struct OllamaGenerator {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGenerator {
    /// Create a new generator for the configured server and model.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let model = self.config.chat_model.as_str();
        let temperature = request.temperature.or(self.config.temperature);
        let body = ChatRequestBody {
            model,
            messages: &request.messages,
            stream,
            options: temperature.map(|temperature| ChatOptions { temperature }),
        };

        let response = self
            .client
            .post(self.config.endpoint("api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ollama::transport_error(e, &self.config.base_url))?;

        ollama::check_status(response, model).await
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.chat_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        info!(
            "Generating answer with model {} from {} messages",
            self.config.chat_model,
            request.messages.len()
        );

        let response = self.send(request, false).await?;
        let bytes = response.bytes().await?;
        let answer = parse_chunk_line(&bytes)?.unwrap_or_default();

        debug!("Generated {} chars", answer.chars().count());
        Ok(answer)
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        info!(
            "Streaming answer with model {} from {} messages",
            self.config.chat_model,
            request.messages.len()
        );

        let response = self.send(request, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => buffer.extend_from_slice(&chunk),
                    Err(err) => {
                        yield Err(ProviderError::from(err));
                        return;
                    }
                }

                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    match parse_chunk_line(&line) {
                        Ok(Some(token)) => {
                            yield Ok(token);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            match parse_chunk_line(&buffer) {
                Ok(Some(token)) => {
                    yield Ok(token);
                }
                Ok(None) => {}
                Err(err) => {
                    yield Err(err);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<()> {
        let installed = ollama::list_models(&self.client, &self.config).await?;
        if ollama::model_installed(&installed, &self.config.chat_model) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotFound(self.config.chat_model.clone()))
        }
    }
}
