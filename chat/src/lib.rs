//! # Chat
//!
//! Conversation sessions that answer questions from retrieved document
//! context. A session retrieves, builds a prompt with a short window of
//! earlier turns, generates, and records the turn.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Session                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  query ──► Retriever::retrieve_context                          │
//! │                 │ empty ──────────────► "no relevant documents" │
//! │                 ▼                                               │
//! │  build_messages(system, history, context, query)                │
//! │                 │                                               │
//! │                 ▼                                               │
//! │  GenerationProvider (timeout, cancellation, optional streaming) │
//! │                 │                                               │
//! │                 ▼                                               │
//! │  ConversationTurn { query, context, answer, error }             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use askdocs_chat::{CancellationToken, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default(), retriever, generator);
//! session.start()?;
//! let turn = session.ask("Who signed the lease?", &CancellationToken::new()).await?;
//! println!("{}", turn.answer);
//! ```

pub mod config;
pub mod error;
pub mod prompt;
pub mod session;
pub mod turn;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, NO_CONTEXT_ANSWER, build_messages, render_question};
pub use session::{Session, SessionState};
pub use turn::{ConversationTurn, ERROR_ANSWER_PREFIX};

pub use tokio_util::sync::CancellationToken;
