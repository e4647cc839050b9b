//! Configuration for conversation sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prompt::{DEFAULT_SYSTEM_PROMPT, NO_CONTEXT_ANSWER};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Earlier successful turns replayed to the model with each question.
    pub history_turns: usize,

    /// Upper bound for producing one answer, in milliseconds.
    pub generation_timeout_ms: u64,

    /// Sampling temperature passed to the model, if set.
    pub temperature: Option<f32>,

    /// Instructions given to the model ahead of every question.
    pub system_prompt: String,

    /// Answer given when retrieval finds nothing, without asking the model.
    pub no_context_answer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_turns: 3,
            generation_timeout_ms: 120_000,
            temperature: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            no_context_answer: NO_CONTEXT_ANSWER.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}
