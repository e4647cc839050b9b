//! Test doubles shared by the askdocs crates.
//!
//! Everything here is deterministic: embeddings are derived from the words of
//! the text, generators answer from a script, and the store fails exactly
//! where it is told to.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use askdocs_providers::{
    Embedding, EmbeddingProvider, GenerationProvider, GenerationRequest, ProviderError, Role,
};
use askdocs_store::{
    DocumentSummary, EmbeddingRecord, LocalVectorStore, QueryMatch, StoreError, VectorStore,
};
use async_trait::async_trait;

/// Dimension of [`HashEmbedder`] vectors.
pub const HASH_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase word adds one to a hashed bucket.
///
/// Texts sharing words get similar vectors, which is enough to make
/// retrieval tests meaningful.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(text: &str) -> Embedding {
        let mut vector = vec![0.0f32; HASH_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(2_166_136_261u32, |hash, b| {
                    (hash ^ u32::from(b)).wrapping_mul(16_777_619)
                }) as usize
                % HASH_DIMENSION;
            vector[bucket] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn model(&self) -> &str {
        "hash-64"
    }

    async fn embed(&self, text: &str) -> askdocs_providers::Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector_for(text))
    }
}

/// Embedder that fails in scripted ways before delegating to [`HashEmbedder`].
pub struct FlakyEmbedder {
    inner: HashEmbedder,
    transient_failures: AtomicUsize,
    poison: Option<String>,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    /// Fail the first `count` calls with a transient error.
    pub fn failing_first(count: usize) -> Self {
        Self {
            inner: HashEmbedder::new(),
            transient_failures: AtomicUsize::new(count),
            poison: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail, transiently, on text containing `marker`.
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            inner: HashEmbedder::new(),
            transient_failures: AtomicUsize::new(0),
            poison: Some(marker.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn name(&self) -> &str {
        "flaky"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, text: &str) -> askdocs_providers::Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .poison
            .as_deref()
            .is_some_and(|marker| text.contains(marker))
        {
            return Err(ProviderError::Unavailable("poisoned text".to_string()));
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Unavailable("warming up".to_string()));
        }

        self.inner.embed(text).await
    }
}

/// One scripted reply of a [`ScriptedGenerator`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this text, streamed as whitespace separated fragments.
    Answer(String),

    /// Fail with a provider error.
    Fail(String),

    /// Never answer.
    Hang,
}

/// Generation provider that replays a script and records every request.
///
/// Once the script is exhausted it echoes the last user message.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &GenerationRequest) -> Reply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| {
            let last_user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Reply::Answer(format!("echo: {last_user}"))
        })
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-v1"
    }

    async fn generate(&self, request: &GenerationRequest) -> askdocs_providers::Result<String> {
        match self.next_reply(request) {
            Reply::Answer(text) => Ok(text),
            Reply::Fail(reason) => Err(ProviderError::Unavailable(reason)),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(ProviderError::Unavailable("hung".to_string()))
            }
        }
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> askdocs_providers::Result<askdocs_providers::TokenStream> {
        match self.next_reply(request) {
            Reply::Answer(text) => {
                let fragments: Vec<askdocs_providers::Result<String>> = text
                    .split_inclusive(' ')
                    .map(|f| Ok(f.to_string()))
                    .collect();
                Ok(Box::pin(futures::stream::iter(fragments)))
            }
            Reply::Fail(reason) => Err(ProviderError::Unavailable(reason)),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(ProviderError::Unavailable("hung".to_string()))
            }
        }
    }
}

/// Store wrapper that fails writes on command.
pub struct FailingStore {
    inner: LocalVectorStore,
    fail_after_batches: Mutex<Option<usize>>,
    batches: AtomicUsize,
}

impl FailingStore {
    /// A healthy in-memory store.
    pub fn new() -> Self {
        Self {
            inner: LocalVectorStore::in_memory(),
            fail_after_batches: Mutex::new(None),
            batches: AtomicUsize::new(0),
        }
    }

    /// Let `count` more batches through, then fail every following batch.
    pub fn fail_after(&self, count: usize) {
        self.batches.store(0, Ordering::SeqCst);
        if let Ok(mut limit) = self.fail_after_batches.lock() {
            *limit = Some(count);
        }
    }

    /// Stop failing.
    pub fn heal(&self) {
        if let Ok(mut limit) = self.fail_after_batches.lock() {
            *limit = None;
        }
    }

    /// Record ids currently stored for a document.
    pub async fn ids(&self, collection: &str, document_id: &str) -> Vec<String> {
        self.inner
            .ids_for_document(collection, document_id)
            .await
            .unwrap_or_default()
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    async fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<EmbeddingRecord>,
    ) -> askdocs_store::Result<()> {
        let limit = self.fail_after_batches.lock().ok().and_then(|l| *l);
        let seen = self.batches.fetch_add(1, Ordering::SeqCst);
        if limit.is_some_and(|limit| seen >= limit) {
            return Err(StoreError::WriteFailed("injected failure".to_string()));
        }
        self.inner.upsert_batch(collection, records).await
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> askdocs_store::Result<usize> {
        self.inner.delete(collection, ids).await
    }

    async fn delete_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> askdocs_store::Result<usize> {
        self.inner.delete_document(collection, document_id).await
    }

    async fn ids_for_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> askdocs_store::Result<Vec<String>> {
        self.inner.ids_for_document(collection, document_id).await
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> askdocs_store::Result<Vec<QueryMatch>> {
        self.inner.query(collection, vector, k).await
    }

    async fn count(&self, collection: &str) -> askdocs_store::Result<usize> {
        self.inner.count(collection).await
    }

    async fn documents(&self, collection: &str) -> askdocs_store::Result<Vec<DocumentSummary>> {
        self.inner.documents(collection).await
    }
}
