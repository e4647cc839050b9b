//! # Providers
//!
//! This crate provides the model-facing half of the document Q&A system:
//! turning text into embeddings and prompts into answers, both served by a
//! local Ollama instance.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert chunks and queries to dense vectors
//! - **Answer Generation**: Chat completion, whole or streamed token by token
//! - **Retry with Backoff**: Bounded exponential backoff for transient failures
//! - **Timeouts**: Every provider call is bounded
//! - **Caching**: Reuse embeddings for repeated text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Providers                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding      GenerationProvider        │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  OllamaEmbedder / CachedEmbedder     OllamaGenerator            │
//! │       │                                   │                     │
//! │       └──────────► RetryPolicy ◄──────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ollama;
pub mod retry;

pub use cache::{CachedEmbedder, EmbeddingCache};
pub use embedding::{EmbeddingProvider, OllamaEmbedder};
pub use error::{ProviderError, Result};
pub use generation::{
    ChatMessage, GenerationProvider, GenerationRequest, OllamaGenerator, Role, TokenStream,
};
pub use ollama::OllamaConfig;
pub use retry::RetryPolicy;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
