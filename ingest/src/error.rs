//! Error types for ingestion.

use std::path::PathBuf;

use askdocs_providers::ProviderError;
use askdocs_store::StoreError;
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Invalid chunking or indexing parameters. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Chunk size of zero.
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    /// Overlap that would stop the chunker from advancing.
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A source file whose text could not be obtained.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No extractor handles this file type.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is corrupt or not what its extension claims.
    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    /// The file parsed but holds no text.
    #[error("no extractable text in {0}")]
    NoText(String),

    /// The OCR fallback did not produce a readable file.
    #[error("ocr failed for {file}: {reason}")]
    Ocr { file: String, reason: String },
}

/// What went wrong while ingesting one document.
#[derive(Error, Debug)]
pub enum IngestFailure {
    /// Text extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Embedding provider error, after retries.
    #[error("embedding error: {0}")]
    Embedding(#[from] ProviderError),

    /// Vector store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ingestion of a single document failed.
#[derive(Error, Debug)]
#[error("failed to ingest {document_id}: {failure}")]
pub struct IngestionError {
    /// Identity of the document that failed.
    pub document_id: String,

    /// The underlying failure.
    #[source]
    pub failure: IngestFailure,
}

impl IngestionError {
    pub fn new(document_id: impl Into<String>, failure: impl Into<IngestFailure>) -> Self {
        Self {
            document_id: document_id.into(),
            failure: failure.into(),
        }
    }
}
