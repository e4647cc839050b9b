//! Embedding chunks and writing them to the vector store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use askdocs_providers::{EmbeddingProvider, RetryPolicy};
use askdocs_store::{EmbeddingRecord, RecordMetadata, VectorStore};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunker::{Chunk, Chunker, ChunkingConfig};
use crate::document::Document;
use crate::error::{ConfigurationError, IngestionError, Result};

/// Configuration for the [`Indexer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Collection records are written to.
    pub collection: String,

    /// How documents are split.
    pub chunking: ChunkingConfig,

    /// Retry policy for embedding calls.
    pub retry: RetryPolicy,

    /// Timeout for a single embedding call, in seconds.
    pub embed_timeout_secs: u64,

    /// Records per store write.
    pub upsert_batch_size: usize,

    /// Pause between consecutive chunk embeddings, in milliseconds.
    pub embed_delay_ms: u64,

    /// Documents ingested at once when the store allows concurrent writes.
    pub max_concurrent_documents: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            collection: "documents".to_string(),
            chunking: ChunkingConfig::default(),
            retry: RetryPolicy::default(),
            embed_timeout_secs: 30,
            upsert_batch_size: 64,
            embed_delay_ms: 0,
            max_concurrent_documents: 4,
        }
    }
}

impl IndexerConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_upsert_batch_size(mut self, size: usize) -> Self {
        self.upsert_batch_size = size;
        self
    }

    pub fn with_embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_concurrent_documents(mut self, count: usize) -> Self {
        self.max_concurrent_documents = count;
        self
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn embed_delay(&self) -> Duration {
        Duration::from_millis(self.embed_delay_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.chunking.validate()?;
        if self.collection.is_empty() {
            return Err(ConfigurationError::Invalid(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.upsert_batch_size == 0 {
            return Err(ConfigurationError::Invalid(
                "upsert_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_documents == 0 {
            return Err(ConfigurationError::Invalid(
                "max_concurrent_documents must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub document_id: String,

    /// Records now stored for the document.
    pub chunks: usize,

    /// Records of the previous version that were removed.
    pub replaced: usize,

    pub duration_ms: u64,
}

/// Per-document outcomes of a batch.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub succeeded: Vec<IngestionResult>,
    pub failed: Vec<IngestionError>,

    /// Ids of documents left alone because they had not changed.
    pub skipped: Vec<String>,
}

impl IngestionReport {
    pub fn total_chunks(&self) -> usize {
        self.succeeded.iter().map(|r| r.chunks).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: IngestionReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }
}

/// Chunks documents, embeds the chunks and stores them.
///
/// Ingestion is idempotent per document id: the records of an earlier
/// version are replaced, never duplicated.
pub struct Indexer {
    config: IndexerConfig,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> std::result::Result<Self, ConfigurationError> {
        config.validate()?;
        let chunker = Chunker::new(config.chunking)?;
        Ok(Self {
            config,
            chunker,
            embedder,
            store,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest one document, replacing any earlier version of it.
    ///
    /// Every chunk is embedded before the store is touched, so an embedding
    /// failure leaves the earlier version in place. A store failure while
    /// writing removes whatever was written for the document.
    pub async fn ingest(&self, document: &Document) -> Result<IngestionResult> {
        let started = Instant::now();
        let id = document.id();
        let collection = self.config.collection.as_str();

        let chunks: Vec<Chunk> = self.chunker.chunk_document(document).collect();
        debug!("Split {id} into {} chunks", chunks.len());

        let vectors = self.embed_chunks(id, &chunks).await?;

        let replaced = self
            .store
            .delete_document(collection, id)
            .await
            .map_err(|e| IngestionError::new(id, e))?;
        if replaced > 0 {
            debug!("Removed {replaced} records of the previous version of {id}");
        }

        let ingested_at = Utc::now();
        let mut pending: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                EmbeddingRecord::new(
                    vector,
                    RecordMetadata {
                        document_id: chunk.document_id,
                        source: document.source().to_string(),
                        chunk_index: chunk.index,
                        start_offset: chunk.start,
                        end_offset: chunk.end,
                        text: chunk.text,
                        content_hash: document.content_hash().to_string(),
                        ingested_at,
                    },
                )
            })
            .collect();
        let stored = pending.len();

        while !pending.is_empty() {
            let rest = pending.split_off(pending.len().min(self.config.upsert_batch_size));
            let batch = std::mem::replace(&mut pending, rest);
            if let Err(err) = self.store.upsert_batch(collection, batch).await {
                self.rollback(id).await;
                return Err(IngestionError::new(id, err));
            }
        }

        let result = IngestionResult {
            document_id: id.to_string(),
            chunks: stored,
            replaced,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            "Ingested {id}: {stored} chunks ({replaced} replaced) in {}ms",
            result.duration_ms
        );
        Ok(result)
    }

    async fn embed_chunks(&self, id: &str, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let timeout = self.config.embed_timeout();
        let delay = self.config.embed_delay();
        let mut vectors = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            if !vectors.is_empty() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let what = format!("embedding chunk {} of {id}", chunk.index);
            let vector = self
                .config
                .retry
                .run(&what, timeout, || self.embedder.embed(&chunk.text))
                .await
                .map_err(|e| IngestionError::new(id, e))?;
            vectors.push(vector);
        }

        Ok(vectors)
    }

    async fn rollback(&self, id: &str) {
        match self
            .store
            .delete_document(&self.config.collection, id)
            .await
        {
            Ok(removed) => warn!("Rolled back {removed} records of {id}"),
            Err(e) => error!("Rollback of {id} failed: {e}"),
        }
    }

    /// Ingest several documents, recording each outcome.
    ///
    /// Documents run concurrently only if the store supports concurrent
    /// writes. One failure never stops the others.
    pub async fn ingest_batch(&self, documents: Vec<Document>) -> IngestionReport {
        let concurrency = if self.store.supports_concurrent_writes() {
            self.config.max_concurrent_documents
        } else {
            1
        };

        let outcomes: Vec<Result<IngestionResult>> = futures::stream::iter(&documents)
            .map(|document| self.ingest(document))
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = IngestionReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => report.succeeded.push(result),
                Err(err) => {
                    warn!("{err}");
                    report.failed.push(err);
                }
            }
        }
        report
    }

    /// Delete every record of a document, returning how many existed.
    pub async fn remove(&self, document_id: &str) -> Result<usize> {
        let removed = self
            .store
            .delete_document(&self.config.collection, document_id)
            .await
            .map_err(|e| IngestionError::new(document_id, e))?;
        info!("Removed {document_id} ({removed} records)");
        Ok(removed)
    }
}
