//! Error types for conversation sessions.

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors returned by [`Session`](crate::Session) operations.
///
/// Retrieval and generation failures are not errors at this level: they are
/// recorded as turns with an error answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation is not allowed in the session's current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The query was cancelled before an answer was produced.
    #[error("query cancelled")]
    Cancelled,

    /// The query was empty or only whitespace.
    #[error("query is empty")]
    EmptyQuery,
}
