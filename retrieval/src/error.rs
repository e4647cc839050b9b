//! Error types for retrieval.

use askdocs_providers::ProviderError;
use askdocs_store::StoreError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while retrieving context for a query.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The query could not be embedded, after retries.
    #[error("embedding error: {0}")]
    Embedding(#[from] ProviderError),

    /// The vector store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
