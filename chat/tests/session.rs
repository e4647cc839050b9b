use std::sync::Arc;
use std::time::Duration;

use askdocs_chat::{
    CancellationToken, ERROR_ANSWER_PREFIX, NO_CONTEXT_ANSWER, Session, SessionConfig,
    SessionError, SessionState,
};
use askdocs_ingest::{Document, Indexer, IndexerConfig};
use askdocs_providers::{EmbeddingProvider, Role, RetryPolicy};
use askdocs_retrieval::{RetrievalConfig, Retriever};
use askdocs_store::{LocalVectorStore, VectorStore};
use askdocs_test_support::{FlakyEmbedder, HashEmbedder, Reply, ScriptedGenerator};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

async fn ingested_store() -> Arc<dyn VectorStore> {
    let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
    let indexer = Indexer::new(
        IndexerConfig::default(),
        Arc::new(HashEmbedder::new()),
        Arc::clone(&store),
    )
    .unwrap();
    let report = indexer
        .ingest_batch(vec![
            Document::from_text(
                "lease.txt",
                "docs/lease.txt",
                "The lease term ends in March. Rent is due monthly.",
            ),
            Document::from_text(
                "garden.md",
                "docs/garden.md",
                "Tomatoes need sun and regular watering.",
            ),
        ])
        .await;
    assert!(report.is_success());
    store
}

fn retriever(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Arc<Retriever> {
    let config = RetrievalConfig::default().with_retry(
        RetryPolicy::default()
            .with_max_retries(1)
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(2)),
    );
    Arc::new(Retriever::new(config, embedder, store))
}

async fn started_session(
    config: SessionConfig,
    generator: Arc<ScriptedGenerator>,
) -> Session {
    let store = ingested_store().await;
    let mut session = Session::new(
        config,
        retriever(Arc::new(HashEmbedder::new()), store),
        generator,
    );
    session.start().unwrap();
    session
}

#[tokio::test]
async fn test_asking_before_start_is_rejected() {
    let store = ingested_store().await;
    let mut session = Session::new(
        SessionConfig::default(),
        retriever(Arc::new(HashEmbedder::new()), store),
        Arc::new(ScriptedGenerator::default()),
    );

    let err = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SessionError::InvalidState {
            operation: "ask",
            state: SessionState::Idle,
        }
    );
    assert!(session.turns().is_empty());
}

#[tokio::test]
async fn test_ended_session_rejects_questions() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = started_session(SessionConfig::default(), generator).await;
    session.end();

    let err = session
        .ask("anything", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidState { .. }));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = started_session(SessionConfig::default(), generator.clone()).await;

    let err = session
        .ask("   \n", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::EmptyQuery);
    assert!(generator.requests().is_empty());
}

#[tokio::test]
async fn test_answer_is_generated_from_cited_context() {
    let generator = Arc::new(ScriptedGenerator::new([Reply::Answer(
        "The lease ends in March [1].".to_string(),
    )]));
    let mut session = started_session(SessionConfig::default(), generator.clone()).await;

    let turn = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(turn.answer, "The lease ends in March [1].");
    assert!(!turn.is_error());
    assert_eq!(turn.context.sources[0].document_id, "lease.txt");
    assert_eq!(session.state(), SessionState::AwaitingQuery);
    assert_eq!(session.turns().len(), 1);

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    let question = requests[0].messages.last().unwrap();
    assert_eq!(question.role, Role::User);
    assert!(question.content.contains("[1] docs/lease.txt (chars 0-50)"));
    assert!(question.content.ends_with("Question: When does the lease end?\nAnswer:"));
}

#[tokio::test]
async fn test_history_is_limited_to_recent_turns() {
    let generator = Arc::new(ScriptedGenerator::new([
        Reply::Answer("first answer".to_string()),
        Reply::Answer("second answer".to_string()),
        Reply::Answer("third answer".to_string()),
    ]));
    let config = SessionConfig::default().with_history_turns(1);
    let mut session = started_session(config, generator.clone()).await;
    let cancel = CancellationToken::new();

    session.ask("lease first", &cancel).await.unwrap();
    session.ask("lease second", &cancel).await.unwrap();
    session.ask("lease third", &cancel).await.unwrap();

    let requests = generator.requests();
    let roles: Vec<Role> = requests[2].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert_eq!(requests[2].messages[1].content, "lease second");
    assert_eq!(requests[2].messages[2].content, "second answer");
}

#[tokio::test]
async fn test_generation_failure_becomes_an_error_turn() {
    let generator = Arc::new(ScriptedGenerator::new([
        Reply::Fail("model exploded".to_string()),
        Reply::Answer("Rent is due monthly.".to_string()),
    ]));
    let mut session = started_session(SessionConfig::default(), generator.clone()).await;
    let cancel = CancellationToken::new();

    let failed = session.ask("When is rent due?", &cancel).await.unwrap();
    assert!(failed.is_error());
    assert!(failed.answer.starts_with(ERROR_ANSWER_PREFIX));
    assert!(failed.answer.contains("model exploded"));
    assert_eq!(session.state(), SessionState::AwaitingQuery);

    let answered = session.ask("When is rent due?", &cancel).await.unwrap();
    assert_eq!(answered.answer, "Rent is due monthly.");
    assert_eq!(session.turns().len(), 2);

    // Failed turns are not replayed to the model.
    let requests = generator.requests();
    assert_eq!(requests[1].messages.len(), 2);
}

#[tokio::test]
async fn test_slow_generation_times_out() {
    let generator = Arc::new(ScriptedGenerator::new([Reply::Hang]));
    let config = SessionConfig::default().with_generation_timeout(Duration::from_millis(50));
    let mut session = started_session(config, generator).await;

    let turn = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(turn.is_error());
    assert!(turn.error.as_deref().unwrap_or_default().contains("timed out"));
    assert_eq!(session.state(), SessionState::AwaitingQuery);
}

#[tokio::test]
async fn test_cancelled_before_asking_records_nothing() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = started_session(SessionConfig::default(), generator.clone()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = session.ask("lease", &cancel).await.unwrap_err();

    assert_eq!(err, SessionError::Cancelled);
    assert!(session.turns().is_empty());
    assert!(generator.requests().is_empty());
    assert_eq!(session.state(), SessionState::AwaitingQuery);
}

#[tokio::test]
async fn test_cancelling_during_generation_leaves_session_usable() {
    let generator = Arc::new(ScriptedGenerator::new([Reply::Hang]));
    let mut session = started_session(SessionConfig::default(), generator.clone()).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = session.ask("When does the lease end?", &cancel).await.unwrap_err();
    assert_eq!(err, SessionError::Cancelled);
    assert!(session.turns().is_empty());
    assert_eq!(session.state(), SessionState::AwaitingQuery);

    let turn = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap();
    assert!(turn.answer.starts_with("echo: Context:"));
    assert_eq!(session.turns().len(), 1);
}

#[tokio::test]
async fn test_empty_collection_answers_without_the_model() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = Session::new(
        SessionConfig::default(),
        retriever(
            Arc::new(HashEmbedder::new()),
            Arc::new(LocalVectorStore::in_memory()),
        ),
        generator.clone(),
    );
    session.start().unwrap();

    let turn = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(turn.answer, NO_CONTEXT_ANSWER);
    assert!(!turn.is_error());
    assert!(turn.context.is_empty());
    assert!(generator.requests().is_empty());
}

#[tokio::test]
async fn test_streamed_fragments_make_up_the_answer() {
    let generator = Arc::new(ScriptedGenerator::new([Reply::Answer(
        "Rent is due monthly [1].".to_string(),
    )]));
    let mut session = started_session(SessionConfig::default(), generator).await;
    let (tx, mut rx) = mpsc::channel(64);

    let turn = session
        .ask_streaming("When is rent due?", &CancellationToken::new(), tx)
        .await
        .unwrap();

    let mut streamed = Vec::new();
    while let Some(fragment) = rx.recv().await {
        streamed.push(fragment);
    }
    assert!(streamed.len() > 1);
    assert_eq!(streamed.concat(), turn.answer);
    assert_eq!(turn.answer, "Rent is due monthly [1].");
}

#[tokio::test]
async fn test_retrieval_failure_becomes_an_error_turn() {
    let store = ingested_store().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = Session::new(
        SessionConfig::default(),
        retriever(Arc::new(FlakyEmbedder::failing_first(10)), store),
        generator.clone(),
    );
    session.start().unwrap();

    let turn = session
        .ask("When does the lease end?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(turn.is_error());
    assert!(turn.answer.starts_with("[error] retrieval failed"));
    assert!(generator.requests().is_empty());
    assert_eq!(session.state(), SessionState::AwaitingQuery);
}
