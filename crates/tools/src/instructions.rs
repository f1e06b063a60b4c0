//! Tool-Calling Prompt Instructions
//!
//! Renders the tool-call grammar and the available tool list into a system
//! prompt fragment. The grammar lives here, next to the parser that consumes
//! it, so prompt and parser cannot drift apart.

use crate::registry::ToolRegistry;

/// Build the tool calling instructions to inject into a system prompt.
pub fn build_tool_call_instructions(registry: &ToolRegistry) -> String {
    let mut tool_descriptions = String::new();
    for (name, description) in registry.descriptions() {
        tool_descriptions.push_str(&format!("- `{}`: {}\n", name, description));
    }

    format!(
        r#"## Tool Calling

To use a tool, output a tool call block in this EXACT format:

```tool_call
{{"tool": "tool_name", "arguments": {{"param": "value"}}}}
```

IMPORTANT:
- The block MUST start with ```tool_call and end with ```
- The JSON MUST be valid
- You can make multiple tool calls in a single response
- After making tool calls, STOP and WAIT for the actual results before continuing
- NEVER fabricate or predict tool results; only use real results provided after execution
- Only use tools from the list below

## Available Tools

{tool_descriptions}"#,
        tool_descriptions = tool_descriptions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResearchTool;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubTool;

    #[async_trait]
    impl ResearchTool for StubTool {
        fn name(&self) -> &str {
            "search"
        }

        fn description(&self) -> &str {
            "Search the web for current information"
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_instructions_contain_grammar_and_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool));

        let instructions = build_tool_call_instructions(&registry);
        assert!(instructions.contains("```tool_call"));
        assert!(instructions.contains("- `search`: Search the web"));
        assert!(instructions.contains("NEVER fabricate"));
    }

    #[test]
    fn test_instructions_round_trip_through_parser() {
        // The example block in the instructions must itself parse.
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool));
        let instructions = build_tool_call_instructions(&registry);

        let calls = crate::parser::parse_tool_calls(&instructions);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "tool_name");
    }
}
