//! Transcript Compression
//!
//! After the research loop stops, the full non-system conversation (with
//! every `think` call and its result stripped) is handed back to the model
//! with a prompt that mandates verbatim preservation of factual statements
//! and citations. The caller degrades to concatenated raw notes when the
//! model call fails.

use std::sync::Arc;

use drafthorse_llm::{LlmError, LlmProvider, Message, MessageRole, UsageStats};
use drafthorse_tools::{names, strip_tool_calls};

/// System prompt for the compression call.
const COMPRESSION_SYSTEM_PROMPT: &str = r#"You are compressing a research conversation into a findings document.

Rules:
- Preserve EVERY factual statement gathered from tools VERBATIM. Do not paraphrase facts, numbers, dates, or names.
- Keep inline citations next to the statements they support, numbered [1], [2], ... sequentially.
- Discard conversational filler, tool mechanics, and dead ends.
- End with a "Sources:" list mapping each citation number to its URL or file path, one per line as "URL: <url>".
- Output only the findings document, nothing else."#;

/// Closing user instruction for the compression call.
const COMPRESSION_REQUEST: &str =
    "Compress the research conversation above into the findings document now.";

/// Marker prefix of a `think` tool result message.
const THINK_RESULT_PREFIX: &str = "Tool result for think:";

/// Drop every reflection from a conversation: `think` call blocks inside
/// assistant turns and the tool-result messages they produced. System
/// messages are dropped too; compression sees only the working conversation.
pub(crate) fn strip_reflections(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|msg| msg.role != MessageRole::System)
        .filter(|msg| {
            !(msg.role == MessageRole::User && msg.content.starts_with(THINK_RESULT_PREFIX))
        })
        .map(|msg| {
            if msg.role == MessageRole::Assistant {
                Message::assistant(strip_tool_calls(&msg.content, names::THINK))
            } else {
                msg.clone()
            }
        })
        .filter(|msg| !msg.content.trim().is_empty())
        .collect()
}

/// Compress the conversation into a cited findings document.
pub(crate) async fn compress_findings(
    provider: &Arc<dyn LlmProvider>,
    messages: &[Message],
    topic: &str,
) -> Result<(String, UsageStats), LlmError> {
    let mut request = vec![Message::system(COMPRESSION_SYSTEM_PROMPT)];
    request.extend(strip_reflections(messages));
    request.push(Message::user(format!(
        "{} The research topic was: {}",
        COMPRESSION_REQUEST, topic
    )));

    let response = provider.chat(request).await?;
    let usage = response.usage;
    match response.first_content() {
        Some(content) if !content.trim().is_empty() => Ok((content.to_string(), usage)),
        _ => Err(LlmError::EmptyResponse),
    }
}
