//! The vector store seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{DocumentSummary, EmbeddingRecord, QueryMatch};

/// A persistent store of chunk embeddings, grouped into named collections.
///
/// A collection that has never been written behaves as an empty one: queries
/// return no matches and counts are zero.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace one record.
    async fn upsert(&self, collection: &str, record: EmbeddingRecord) -> Result<()> {
        self.upsert_batch(collection, vec![record]).await
    }

    /// Insert or replace records. A failed batch leaves none of its records behind.
    async fn upsert_batch(&self, collection: &str, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Delete records by id, returning how many existed.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Delete every record of a document, returning how many existed.
    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize>;

    /// Ids of a document's records, in chunk order.
    async fn ids_for_document(&self, collection: &str, document_id: &str) -> Result<Vec<String>>;

    /// The `k` records most similar to `vector`, best first.
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Per-document summaries of a collection.
    async fn documents(&self, collection: &str) -> Result<Vec<DocumentSummary>>;

    /// Whether independent writers may call this store at the same time.
    fn supports_concurrent_writes(&self) -> bool {
        false
    }

    /// Make all completed writes durable.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
