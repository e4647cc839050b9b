//! Conversation turns.

use askdocs_retrieval::AssembledContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every answer that stands in for a failure.
pub const ERROR_ANSWER_PREFIX: &str = "[error]";

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,

    /// Context the answer was generated from.
    pub context: AssembledContext,

    /// The model's answer, or an `[error] ...` sentinel when it failed.
    pub answer: String,

    /// Why the turn failed, if it did.
    pub error: Option<String>,

    pub asked_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ConversationTurn {
    pub(crate) fn answered(
        query: String,
        context: AssembledContext,
        answer: String,
        asked_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            query,
            context,
            answer,
            error: None,
            asked_at,
            duration_ms,
        }
    }

    pub(crate) fn failed(
        query: String,
        context: AssembledContext,
        reason: String,
        asked_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            query,
            context,
            answer: format!("{ERROR_ANSWER_PREFIX} {reason}"),
            error: Some(reason),
            asked_at,
            duration_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
