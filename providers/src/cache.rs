//! Embedding cache for repeated text.
//!
//! Chat sessions tend to embed the same follow-up questions again, and
//! re-ingesting a lightly edited document repeats most of its chunks. The
//! cache keys embeddings by model and a SHA-256 digest of the text.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;

#[derive(Debug, Clone)]
struct CacheEntry {
    embedding: Embedding,

    /// Insertion sequence number, used to evict the oldest entry.
    sequence: u64,
}

/// Bounded in-memory cache of embeddings.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    next_sequence: AtomicU64,
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new cache holding at most `max_entries` embeddings.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
            max_entries,
        }
    }

    fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::key(text, model);
        self.entries
            .read()
            .await
            .get(&key)
            .map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let key = Self::key(text, model);
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.sequence)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                embedding,
                sequence,
            },
        );
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            max_entries: self.max_entries,
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,
}

/// An embedding provider that consults a cache before the wrapped provider.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    /// Wrap `inner` with a cache of `max_entries` embeddings.
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_entries: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(max_entries),
        }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.inner.model();
        if let Some(embedding) = self.cache.get(text, model).await {
            debug!("Cache hit for embedding");
            return Ok(embedding);
        }

        let embedding = self.inner.embed(text).await?;
        self.cache.put(text, model, embedding.clone()).await;
        Ok(embedding)
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "counting-v1"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache.put("hello", "model-1", embedding.clone()).await;

        assert_eq!(cache.get("hello", "model-1").await, Some(embedding));
        assert_eq!(cache.get("hello", "model-2").await, None);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        cache.put("c", "model", vec![3.0]).await;

        assert_eq!(cache.stats().await.entries, 2);
        assert_eq!(cache.get("a", "model").await, None);
        assert_eq!(cache.get("c", "model").await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_cached_embedder_calls_inner_once() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), 16);

        let first = cached.embed("what is due?").await.unwrap();
        let second = cached.embed("what is due?").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.model(), "counting-v1");
    }
}
