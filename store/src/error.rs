//! Error types for the vector store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Vector length differs from the collection's dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Collection name cannot be used as a file name.
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    /// A persisted collection could not be read back.
    #[error("corrupt collection file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The store rejected a write.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
