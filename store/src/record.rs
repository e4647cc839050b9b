//! Records kept in the vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a stored vector came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Identity of the source document.
    pub document_id: String,

    /// Human readable label of the source, usually its path.
    pub source: String,

    /// Position of the chunk within its document.
    pub chunk_index: usize,

    /// Character offset where the chunk starts.
    pub start_offset: usize,

    /// Character offset where the chunk ends (exclusive).
    pub end_offset: usize,

    /// The chunk text.
    pub text: String,

    /// Hash of the document content the chunk was cut from.
    pub content_hash: String,

    /// When the chunk was ingested.
    pub ingested_at: DateTime<Utc>,
}

/// A chunk embedding together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique record identifier within a collection.
    pub id: String,

    /// The embedding vector.
    pub vector: Vec<f32>,

    /// Provenance of the vector.
    pub metadata: RecordMetadata,
}

impl EmbeddingRecord {
    /// Create a record whose id is derived from its document and chunk index.
    pub fn new(vector: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id: Self::record_id(&metadata.document_id, metadata.chunk_index),
            vector,
            metadata,
        }
    }

    /// Stable record id for a chunk of a document.
    pub fn record_id(document_id: &str, chunk_index: usize) -> String {
        format!("{document_id}::chunk_{chunk_index}")
    }
}

/// A record matched by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record identifier.
    pub id: String,

    /// Cosine similarity to the query vector.
    pub score: f32,

    /// Provenance of the matched vector.
    pub metadata: RecordMetadata,
}

/// Summary of one document's presence in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub source: String,
    pub chunks: usize,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_id_format() {
        assert_eq!(
            EmbeddingRecord::record_id("handbook.pdf", 3),
            "handbook.pdf::chunk_3"
        );
    }
}
