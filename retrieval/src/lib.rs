//! # Retrieval
//!
//! Embeds a question, finds the closest chunks in the vector store, and
//! renders them into a bounded context that cites where each piece came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Retrieval                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  query ──► EmbeddingProvider ──► VectorStore::query             │
//! │                                        │                        │
//! │                                        ▼                        │
//! │                              rank (score, chunk, doc)           │
//! │                                        │                        │
//! │                                        ▼                        │
//! │                  assemble_context ──► AssembledContext          │
//! │                                          + ContextSource[]      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use askdocs_retrieval::{RetrievalConfig, Retriever};
//!
//! let retriever = Retriever::new(RetrievalConfig::default(), embedder, store);
//! let context = retriever.retrieve_context("When does the lease end?").await?;
//! println!("{}", context.text);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod retriever;

pub use config::RetrievalConfig;
pub use context::{AssembledContext, ContextSource, assemble_context};
pub use error::{Result, RetrievalError};
pub use retriever::Retriever;

pub use askdocs_store::QueryMatch;
