//! Configuration for the retriever.

use std::time::Duration;

use askdocs_providers::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for the [`Retriever`](crate::Retriever).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Collection searched.
    pub collection: String,

    /// Chunks retrieved per query.
    pub top_k: usize,

    /// Upper bound for the assembled context, in characters.
    pub max_context_chars: usize,

    /// Matches scoring below this are discarded.
    pub min_score: Option<f32>,

    /// Retry policy for query embedding.
    pub retry: RetryPolicy,

    /// Timeout for embedding the query, in seconds.
    pub query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "documents".to_string(),
            top_k: 4,
            max_context_chars: 4_000,
            min_score: None,
            retry: RetryPolicy::default(),
            query_timeout_secs: 30,
        }
    }
}

impl RetrievalConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
