//! # Ingestion
//!
//! Turns source files into embedded, stored chunks.
//!
//! ## Features
//!
//! - **Extraction**: PDF (per page), plain text and markdown, with an optional
//!   OCR fallback for scanned PDFs
//! - **Chunking**: Overlapping character windows that prefer sentence ends
//! - **Indexing**: Embeds every chunk with retry, then replaces the document's
//!   records in one pass, rolling back on store failure
//! - **Change Tracking**: Unchanged files are skipped by content hash
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Ingestion                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  path ──► DocumentLoader ──► Document ──► Chunker ──► Chunk     │
//! │                │                                        │       │
//! │                ▼                                        ▼       │
//! │        ExtractorRegistry               Indexer ──► VectorStore  │
//! │                                           │                     │
//! │                                           ▼                     │
//! │                       IngestPipeline ──► IngestState            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod document;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod pipeline;
pub mod state;

pub use chunker::{Chunk, Chunker, ChunkingConfig, Chunks};
pub use document::{Document, content_hash, document_id_for};
pub use error::{ConfigurationError, ExtractionError, IngestFailure, IngestionError, Result};
pub use extract::{
    DocumentLoader, ExtractorRegistry, OcrConfig, OcrFallback, PdfExtractor, PlainTextExtractor,
    TextExtractor,
};
pub use indexer::{Indexer, IndexerConfig, IngestionReport, IngestionResult};
pub use pipeline::IngestPipeline;
pub use state::{FileState, IngestState, STATE_FILE_NAME};
