//! Prompt construction.

use askdocs_providers::ChatMessage;

use crate::turn::ConversationTurn;

/// Default instructions for the model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.\n\
Use the provided context to answer accurately and concisely.\n\
Cite the numbered sources you rely on, like [1].\n\
If the context does not contain the answer, say that you don't know.";

/// Answer when no document matched the question.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant documents found. Try rephrasing the question or ingesting more documents.";

/// The final user message: context, then the question.
pub fn render_question(context: &str, query: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {query}\nAnswer:")
}

/// Messages for one generation request.
///
/// The system prompt comes first, then each of `history` as a user/assistant
/// pair, then the question with its context.
pub fn build_messages(
    system_prompt: &str,
    history: &[&ConversationTurn],
    context: &str,
    query: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    for turn in history {
        messages.push(ChatMessage::user(turn.query.as_str()));
        messages.push(ChatMessage::assistant(turn.answer.as_str()));
    }
    messages.push(ChatMessage::user(render_question(context, query)));
    messages
}
