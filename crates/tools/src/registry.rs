//! Research Tool Trait and Registry
//!
//! `ResearchTool` is the uniform adapter surface: a name, a description for
//! the system prompt, and an async `execute` returning text or an error
//! string. Error strings are surfaced back into the conversation so the
//! model can self-correct; they are never propagated as run failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// A tool the sub-researcher (or supervisor) can invoke.
#[async_trait]
pub trait ResearchTool: Send + Sync {
    /// Unique name of this tool (e.g., "search", "read_xlsx").
    fn name(&self) -> &str;

    /// Human-readable description, rendered into the system prompt.
    fn description(&self) -> &str;

    /// Execute the tool with JSON arguments.
    ///
    /// Returns the tool's text output, or an error string the caller feeds
    /// back into the conversation.
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// Registry for `ResearchTool` implementations.
///
/// Provides O(1) lookup by name and deterministic, insertion-ordered
/// iteration so prompt rendering and tests are stable.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ResearchTool>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ResearchTool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ResearchTool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// (name, description) pairs in registration order.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| (tool.name().to_string(), tool.description().to_string()))
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// An unknown tool is an error string like any other tool failure, so
    /// the model can recover in-conversation.
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => {
                tracing::debug!(tool = name, "execution requested for unregistered tool");
                Err(format!("Unknown tool: {}", name))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a tool result for injection back into the conversation.
pub fn format_tool_result(tool_name: &str, result: &str) -> String {
    format!("Tool result for {}:\n{}", tool_name, result)
}

/// Format a tool error for injection back into the conversation.
pub fn format_tool_error(tool_name: &str, error: &str) -> String {
    format!("Tool error ({}): {}", tool_name, error)
}
