//! Query embedding, similarity search and ranking.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use askdocs_providers::EmbeddingProvider;
use askdocs_store::{QueryMatch, VectorStore};
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::context::{AssembledContext, assemble_context};
use crate::error::Result;

/// Finds the chunks most relevant to a query and assembles them into context.
pub struct Retriever {
    config: RetrievalConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The `k` chunks most similar to `query`, best first.
    ///
    /// Ties in score are broken by ascending chunk index, then document id.
    /// An empty collection yields no results rather than an error, and so does
    /// `k == 0`, without calling the embedding provider.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let collection = self.config.collection.as_str();
        if self.store.count(collection).await? == 0 {
            debug!("Collection {collection} is empty");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let vector = self
            .config
            .retry
            .run("embedding query", self.config.query_timeout(), || {
                self.embedder.embed(query)
            })
            .await?;

        let mut results = self.store.query(collection, &vector, k).await?;
        if let Some(min_score) = self.config.min_score {
            results.retain(|m| m.score >= min_score);
        }
        results.sort_by(rank_order);
        results.truncate(k);

        debug!(
            "Retrieved {} chunks in {:?} (best score {:?})",
            results.len(),
            started.elapsed(),
            results.first().map(|m| m.score)
        );
        Ok(results)
    }

    /// Render ranked results into a context bounded by `max_context_chars`.
    pub fn assemble(&self, results: &[QueryMatch]) -> AssembledContext {
        assemble_context(results, self.config.max_context_chars)
    }

    /// Retrieve `top_k` chunks for `query` and assemble them.
    pub async fn retrieve_context(&self, query: &str) -> Result<AssembledContext> {
        let results = self.retrieve(query, self.config.top_k).await?;
        let context = self.assemble(&results);
        info!(
            "Assembled {} of {} chunks ({} chars) for query",
            context.sources.len(),
            results.len(),
            context.char_count()
        );
        Ok(context)
    }
}

/// Descending score, then ascending chunk index, then document id.
fn rank_order(a: &QueryMatch, b: &QueryMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.metadata.chunk_index.cmp(&b.metadata.chunk_index))
        .then_with(|| a.metadata.document_id.cmp(&b.metadata.document_id))
}
