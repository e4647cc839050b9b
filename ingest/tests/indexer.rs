use std::sync::Arc;
use std::time::Duration;

use askdocs_ingest::{ChunkingConfig, Document, IngestFailure, Indexer, IndexerConfig};
use askdocs_providers::{EmbeddingProvider, RetryPolicy};
use askdocs_store::{LocalVectorStore, VectorStore};
use askdocs_test_support::{FailingStore, FlakyEmbedder, HashEmbedder};
use pretty_assertions::assert_eq;

const COLLECTION: &str = "documents";

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_initial_backoff(Duration::from_millis(1))
        .with_max_backoff(Duration::from_millis(5))
}

fn config() -> IndexerConfig {
    IndexerConfig::default()
        .with_chunking(ChunkingConfig::new(50, 10))
        .with_retry(fast_retry(2))
}

fn indexer(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Indexer {
    Indexer::new(config(), embedder, store).unwrap()
}

fn long_document(id: &str) -> Document {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(8);
    Document::from_text(id, format!("docs/{id}"), text)
}

#[tokio::test]
async fn test_reingesting_keeps_one_record_per_chunk() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let indexer = indexer(Arc::new(HashEmbedder::new()), Arc::clone(&store));
    let document = long_document("fox.txt");

    let first = indexer.ingest(&document).await.unwrap();
    let second = indexer.ingest(&document).await.unwrap();

    assert!(first.chunks > 1);
    assert_eq!(first.replaced, 0);
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(second.replaced, first.chunks);
    assert_eq!(store.count(COLLECTION).await.unwrap(), first.chunks);

    let ids = store.ids_for_document(COLLECTION, "fox.txt").await.unwrap();
    let expected: Vec<String> = (0..first.chunks)
        .map(|i| format!("fox.txt::chunk_{i}"))
        .collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_ten_thousand_characters_make_eleven_records() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let indexer = Indexer::new(
        IndexerConfig::default(),
        Arc::new(HashEmbedder::new()),
        Arc::clone(&store),
    )
    .unwrap();

    let document = Document::from_text("blob.txt", "blob.txt", "x".repeat(10_000));
    let result = indexer.ingest(&document).await.unwrap();

    assert_eq!(result.chunks, 11);
    let summaries = store.documents(COLLECTION).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].chunks, 11);
    assert_eq!(summaries[0].content_hash, document.content_hash());
}

#[tokio::test]
async fn test_embedding_failure_keeps_previous_version() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let v1 = Document::from_text("notes.md", "notes.md", "alpha beta gamma");
    indexer(Arc::new(HashEmbedder::new()), Arc::clone(&store))
        .ingest(&v1)
        .await
        .unwrap();

    let flaky = Arc::new(FlakyEmbedder::failing_on("POISON"));
    let failing = indexer(flaky.clone(), Arc::clone(&store));
    let v2 = Document::from_text("notes.md", "notes.md", "POISON delta");
    let err = failing.ingest(&v2).await.unwrap_err();

    assert_eq!(err.document_id, "notes.md");
    assert!(matches!(err.failure, IngestFailure::Embedding(_)));
    // One attempt plus two retries.
    assert_eq!(flaky.calls(), 3);

    let summaries = store.documents(COLLECTION).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].content_hash, v1.content_hash());
}

#[tokio::test]
async fn test_transient_embedding_errors_are_retried() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let flaky = Arc::new(FlakyEmbedder::failing_first(2));
    let indexer = indexer(flaky.clone(), Arc::clone(&store));

    let result = indexer
        .ingest(&Document::from_text("a.txt", "a.txt", "short text"))
        .await
        .unwrap();

    assert_eq!(result.chunks, 1);
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_document() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let flaky = Arc::new(FlakyEmbedder::failing_first(10));
    let indexer = indexer(flaky.clone(), Arc::clone(&store));

    let err = indexer
        .ingest(&Document::from_text("a.txt", "a.txt", "short text"))
        .await
        .unwrap_err();

    assert!(matches!(err.failure, IngestFailure::Embedding(_)));
    assert_eq!(flaky.calls(), 3);
    assert_eq!(store.count(COLLECTION).await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_failure_mid_document_rolls_back() {
    let store = Arc::new(FailingStore::new());
    let indexer = Indexer::new(
        config().with_upsert_batch_size(1),
        Arc::new(HashEmbedder::new()),
        store.clone(),
    )
    .unwrap();
    let document = long_document("fox.txt");

    store.fail_after(2);
    let err = indexer.ingest(&document).await.unwrap_err();
    assert!(matches!(err.failure, IngestFailure::Store(_)));
    assert_eq!(store.ids(COLLECTION, "fox.txt").await, Vec::<String>::new());

    store.heal();
    let result = indexer.ingest(&document).await.unwrap();
    assert_eq!(store.ids(COLLECTION, "fox.txt").await.len(), result.chunks);
}

#[tokio::test]
async fn test_batch_reports_each_document() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let indexer = indexer(
        Arc::new(FlakyEmbedder::failing_on("POISON")),
        Arc::clone(&store),
    );

    let report = indexer
        .ingest_batch(vec![
            Document::from_text("good-1.txt", "good-1.txt", "first healthy document"),
            Document::from_text("bad.txt", "bad.txt", "POISON inside"),
            Document::from_text("good-2.txt", "good-2.txt", "second healthy document"),
        ])
        .await;

    let succeeded: Vec<&str> = report
        .succeeded
        .iter()
        .map(|r| r.document_id.as_str())
        .collect();
    assert_eq!(succeeded, vec!["good-1.txt", "good-2.txt"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].document_id, "bad.txt");
    assert!(!report.is_success());
    assert_eq!(report.total_chunks(), 2);
    assert_eq!(store.count(COLLECTION).await.unwrap(), 2);
}

#[tokio::test]
async fn test_remove_deletes_every_record() {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let indexer = indexer(Arc::new(HashEmbedder::new()), Arc::clone(&store));
    let result = indexer.ingest(&long_document("fox.txt")).await.unwrap();

    assert_eq!(indexer.remove("fox.txt").await.unwrap(), result.chunks);
    assert_eq!(indexer.remove("fox.txt").await.unwrap(), 0);
    assert_eq!(store.count(COLLECTION).await.unwrap(), 0);
}
