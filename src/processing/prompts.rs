//! Prompt assembly for grounded answers and summaries.

use crate::llm::ChatMessage;
use crate::processing::types::{ConversationTurn, Page, TurnRole};
use crate::vector_index::ScoredChunk;

const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Keep the answer concise and academic.";

const SUMMARY_PROMPT: &str = "Write a concise summary of the following:";

/// Build the message list for a retrieval-augmented answer.
///
/// Layout: one system message carrying the instructions and the retrieved context, the
/// caller's prior turns in order, then the question as the final user message.
pub(crate) fn build_qa_messages(
    context: &[ScoredChunk],
    history: &[ConversationTurn],
    question: &str,
) -> Vec<ChatMessage> {
    let context_block = context
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "{QA_SYSTEM_PROMPT}\n\n{context_block}"
    )));
    messages.extend(history_messages(history));
    messages.push(ChatMessage::user(question));
    messages
}

/// Map caller-supplied turns onto chat messages, dropping unknown roles.
pub(crate) fn history_messages(history: &[ConversationTurn]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|turn| match turn.role {
            TurnRole::User => Some(ChatMessage::user(turn.content.clone())),
            TurnRole::Assistant => Some(ChatMessage::assistant(turn.content.clone())),
            TurnRole::Other => None,
        })
        .collect()
}

/// Build a single-pass summary request over `pages`.
pub(crate) fn build_summary_messages(pages: &[Page]) -> Vec<ChatMessage> {
    let body = pages
        .iter()
        .map(|page| page.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![ChatMessage::user(format!(
        "{SUMMARY_PROMPT}\n\n\"{body}\"\n\nCONCISE SUMMARY:"
    ))]
}
