//! The conversation session state machine.
//!
//! ```text
//!            start()
//!   Idle ─────────────► AwaitingQuery ◄──────────────────────┐
//!    ▲                        │ ask()                        │
//!    │ end()                  ▼                              │
//!    └──────────────────  Retrieving ──► Generating ─────────┘
//!                                          turn recorded,
//!                                          or cancelled
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use askdocs_providers::{GenerationProvider, GenerationRequest, ProviderError};
use askdocs_retrieval::{AssembledContext, Retriever};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::prompt::build_messages;
use crate::turn::ConversationTurn;

/// Where a session is in answering questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingQuery,
    Retrieving,
    Generating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingQuery => "awaiting a query",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
        };
        f.write_str(name)
    }
}

/// Why generation produced no answer.
enum GenerationFailure {
    Provider(ProviderError),
    TimedOut,
    Empty,
}

/// A conversation over the document collection.
///
/// One session answers one question at a time; concurrent conversations use
/// separate sessions sharing the same retriever and provider.
pub struct Session {
    config: SessionConfig,
    retriever: Arc<Retriever>,
    generator: Arc<dyn GenerationProvider>,
    state: SessionState,
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        retriever: Arc<Retriever>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            config,
            retriever,
            generator,
            state: SessionState::Idle,
            turns: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every recorded turn, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Begin accepting questions.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::AwaitingQuery;
                debug!("Session started");
                Ok(())
            }
            SessionState::AwaitingQuery => Ok(()),
            state => Err(SessionError::InvalidState {
                operation: "start",
                state,
            }),
        }
    }

    /// Stop accepting questions. Recorded turns are kept.
    pub fn end(&mut self) {
        self.state = SessionState::Idle;
        debug!("Session ended after {} turns", self.turns.len());
    }

    /// Forget every recorded turn.
    pub fn clear_history(&mut self) {
        self.turns.clear();
    }

    /// Answer `query` from the documents.
    ///
    /// Retrieval and generation failures still produce a turn, whose answer
    /// is an `[error] ...` sentinel. Cancellation produces no turn.
    pub async fn ask(&mut self, query: &str, cancel: &CancellationToken) -> Result<ConversationTurn> {
        self.run(query, cancel, None).await
    }

    /// Like [`ask`](Self::ask), also sending each generated fragment to
    /// `tokens` as it arrives.
    pub async fn ask_streaming(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
        tokens: mpsc::Sender<String>,
    ) -> Result<ConversationTurn> {
        self.run(query, cancel, Some(tokens)).await
    }

    async fn run(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
        tokens: Option<mpsc::Sender<String>>,
    ) -> Result<ConversationTurn> {
        if self.state != SessionState::AwaitingQuery {
            return Err(SessionError::InvalidState {
                operation: "ask",
                state: self.state,
            });
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery);
        }

        let started = Instant::now();
        let asked_at = Utc::now();

        self.state = SessionState::Retrieving;
        let retriever = Arc::clone(&self.retriever);
        let retrieved = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(self.cancelled()),
            retrieved = retriever.retrieve_context(query) => retrieved,
        };

        let context = match retrieved {
            Ok(context) => context,
            Err(e) => {
                warn!("Retrieval failed: {e}");
                let turn = ConversationTurn::failed(
                    query.to_string(),
                    AssembledContext::default(),
                    format!("retrieval failed: {e}"),
                    asked_at,
                    elapsed_ms(started),
                );
                return Ok(self.record(turn));
            }
        };

        if context.is_empty() {
            info!("No relevant documents for query");
            let turn = ConversationTurn::answered(
                query.to_string(),
                context,
                self.config.no_context_answer.clone(),
                asked_at,
                elapsed_ms(started),
            );
            return Ok(self.record(turn));
        }

        self.state = SessionState::Generating;
        let request = self.request_for(&context.text, query);
        let generation = generate(
            Arc::clone(&self.generator),
            request,
            tokens,
            self.config.generation_timeout(),
        );
        let generated = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(self.cancelled()),
            generated = generation => generated,
        };

        let duration_ms = elapsed_ms(started);
        let turn = match generated {
            Ok(answer) => {
                info!("Answered in {duration_ms}ms from {} sources", context.sources.len());
                ConversationTurn::answered(query.to_string(), context, answer, asked_at, duration_ms)
            }
            Err(failure) => {
                let reason = match failure {
                    GenerationFailure::Provider(e) => format!("generation failed: {e}"),
                    GenerationFailure::TimedOut => format!(
                        "generation timed out after {:?}",
                        self.config.generation_timeout()
                    ),
                    GenerationFailure::Empty => "the model returned an empty answer".to_string(),
                };
                warn!("{reason}");
                ConversationTurn::failed(query.to_string(), context, reason, asked_at, duration_ms)
            }
        };
        Ok(self.record(turn))
    }

    fn request_for(&self, context: &str, query: &str) -> GenerationRequest {
        let mut history: Vec<&ConversationTurn> = self
            .turns
            .iter()
            .rev()
            .filter(|turn| !turn.is_error())
            .take(self.config.history_turns)
            .collect();
        history.reverse();

        let request = GenerationRequest::new(build_messages(
            &self.config.system_prompt,
            &history,
            context,
            query,
        ));
        match self.config.temperature {
            Some(temperature) => request.with_temperature(temperature),
            None => request,
        }
    }

    fn record(&mut self, turn: ConversationTurn) -> ConversationTurn {
        self.turns.push(turn.clone());
        self.state = SessionState::AwaitingQuery;
        turn
    }

    fn cancelled(&mut self) -> SessionError {
        info!("Query cancelled while {}", self.state);
        self.state = SessionState::AwaitingQuery;
        SessionError::Cancelled
    }
}

async fn generate(
    generator: Arc<dyn GenerationProvider>,
    request: GenerationRequest,
    tokens: Option<mpsc::Sender<String>>,
    timeout: std::time::Duration,
) -> std::result::Result<String, GenerationFailure> {
    let produce = async {
        match tokens {
            None => generator.generate(&request).await,
            Some(tokens) => {
                let mut stream = generator.generate_stream(&request).await?;
                let mut answer = String::new();
                while let Some(fragment) = stream.next().await {
                    let fragment = fragment?;
                    answer.push_str(&fragment);
                    // A listener that went away does not stop the answer.
                    let _ = tokens.send(fragment).await;
                }
                Ok(answer)
            }
        }
    };

    let answer = tokio::time::timeout(timeout, produce)
        .await
        .map_err(|_| GenerationFailure::TimedOut)?
        .map_err(GenerationFailure::Provider)?;

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(GenerationFailure::Empty);
    }
    Ok(answer.to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
