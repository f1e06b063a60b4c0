//! Tool-Call Grammar Parser
//!
//! The engine's system prompts instruct the model to emit tool calls in one
//! exact format: a fenced block opening with `` ```tool_call `` containing a
//! JSON object with a `tool` name and an `arguments` object.
//!
//! The parser is pure syntax. It returns calls in appearance order, tolerates
//! surrounding prose, skips malformed blocks, and preserves duplicates (the
//! supervisor dedupes semantically). Zero parsed calls is not an error;
//! callers treat an empty list as a termination signal.

use serde::{Deserialize, Serialize};

/// Opening marker of a tool call block
const OPEN_MARKER: &str = "```tool_call";

/// Closing marker of a tool call block
const CLOSE_MARKER: &str = "```";

/// A tool call parsed from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The name of the tool to call
    pub tool: String,
    /// The arguments as a JSON value (always an object)
    pub args: serde_json::Value,
}

impl ToolCall {
    /// Fetch a string argument by key, trimmed; None when absent or empty.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Fetch an integer argument by key.
    pub fn int_arg(&self, key: &str) -> Option<i64> {
        self.args.get(key).and_then(|v| v.as_i64())
    }
}

/// Parse tool call blocks from a model response.
///
/// Returns the calls in appearance order. Malformed blocks (invalid JSON,
/// missing `tool` field, unterminated fence) are skipped.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut remaining = text;

    while let Some(start) = remaining.find(OPEN_MARKER) {
        let after_marker = &remaining[start + OPEN_MARKER.len()..];

        let Some(end) = after_marker.find(CLOSE_MARKER) else {
            // Unterminated block: nothing after this point can parse.
            break;
        };

        let block = after_marker[..end].trim();
        if let Some(call) = parse_single_block(block) {
            calls.push(call);
        }

        remaining = &after_marker[end + CLOSE_MARKER.len()..];
    }

    calls
}

/// Parse one block's JSON payload into a ToolCall.
fn parse_single_block(block: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(block).ok()?;
    let tool = json.get("tool")?.as_str()?.trim();
    if tool.is_empty() {
        return None;
    }

    let args = match json.get("arguments") {
        Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map.clone()),
        // Tolerate a missing or non-object arguments field
        _ => serde_json::Value::Object(serde_json::Map::new()),
    };

    Some(ToolCall {
        tool: tool.to_string(),
        args,
    })
}

/// Remove every tool call block for the given tool from a response text.
///
/// Used by transcript compression to strip `think` calls before the
/// conversation is handed back to the model. Blocks for other tools and the
/// surrounding prose are left untouched.
pub fn strip_tool_calls(text: &str, tool: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut remaining = text;

    while let Some(start) = remaining.find(OPEN_MARKER) {
        let after_marker = &remaining[start + OPEN_MARKER.len()..];

        let Some(end) = after_marker.find(CLOSE_MARKER) else {
            break;
        };

        let block = after_marker[..end].trim();
        let matches_tool = parse_single_block(block).map_or(false, |c| c.tool == tool);

        if matches_tool {
            result.push_str(remaining[..start].trim_end_matches(' '));
        } else {
            // Keep the whole block verbatim
            let block_end = start + OPEN_MARKER.len() + end + CLOSE_MARKER.len();
            result.push_str(&remaining[..block_end]);
        }

        remaining = &after_marker[end + CLOSE_MARKER.len()..];
    }

    result.push_str(remaining);
    result
}
