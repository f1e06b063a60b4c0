//! Tool Adapters
//!
//! The concrete research tools and the registry assembly the sub-researchers
//! run with. Each adapter is a thin `ResearchTool` over a service that does
//! the real work, so services can be shared (the fetch service backs both
//! the `fetch` tool and search's inline summaries).

pub mod csv_analyze;
pub mod documents;
pub mod web_fetch;
pub mod web_search;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use drafthorse_tools::{names, ResearchTool, ToolRegistry};

use crate::config::EngineConfig;

pub use csv_analyze::AnalyzeCsvTool;
pub use documents::{ReadDocumentTool, ReadXlsxTool};
pub use web_fetch::{WebFetchService, WebFetchTool};
pub use web_search::{SearchProvider, SearchResult, WebSearchTool};

/// The `think` tool: records a reflection with no external effect.
///
/// The reflection stays in the conversation (the model reads it back on the
/// next turn) but is excluded from raw notes and stripped before
/// compression.
pub struct ThinkTool;

#[async_trait]
impl ResearchTool for ThinkTool {
    fn name(&self) -> &str {
        names::THINK
    }

    fn description(&self) -> &str {
        "Reflect on what you have learned so far and what gaps remain. Arguments: {\"thought\": \"...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let thought = args
            .get("thought")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing 'thought' argument".to_string())?;

        tracing::debug!(thought_chars = thought.len(), "reflection recorded");
        Ok("Reflection recorded.".to_string())
    }
}

/// Whether a tool's output is a retrieval artifact that belongs in raw notes.
///
/// `think` output is deliberately excluded: reflections live only in the
/// conversation and never reach insight extraction.
pub fn is_data_tool(name: &str) -> bool {
    matches!(
        name,
        names::SEARCH
            | names::FETCH
            | names::READ_DOCUMENT
            | names::READ_XLSX
            | names::ANALYZE_CSV
    )
}

/// Assemble the default sub-researcher tool set.
///
/// `search_provider` / `search_api_key` select the web search backend; the
/// document and CSV tools are always present.
pub fn build_research_registry(
    config: &EngineConfig,
    search_provider: &str,
    search_api_key: Option<&str>,
) -> Result<ToolRegistry, String> {
    let fetcher = Arc::new(WebFetchService::new());

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new(
        search_provider,
        search_api_key,
        fetcher.clone(),
        config.search.clone(),
    )?));
    registry.register(Arc::new(WebFetchTool::new(fetcher)));
    registry.register(Arc::new(ReadDocumentTool::new(config.documents.clone())));
    registry.register(Arc::new(ReadXlsxTool::new(config.documents.clone())));
    registry.register(Arc::new(AnalyzeCsvTool));
    registry.register(Arc::new(ThinkTool));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_think_tool() {
        let tool = ThinkTool;
        let result = tool
            .execute(serde_json::json!({"thought": "sources agree on the handshake"}))
            .await
            .unwrap();
        assert_eq!(result, "Reflection recorded.");

        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert_eq!(err, "Missing 'thought' argument");
    }

    #[test]
    fn test_is_data_tool() {
        assert!(is_data_tool("search"));
        assert!(is_data_tool("fetch"));
        assert!(is_data_tool("read_document"));
        assert!(is_data_tool("read_xlsx"));
        assert!(is_data_tool("analyze_csv"));
        assert!(!is_data_tool("think"));
        assert!(!is_data_tool("conduct_research"));
    }

    #[test]
    fn test_build_research_registry() {
        let registry =
            build_research_registry(&EngineConfig::default(), "duckduckgo", None).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "search",
                "fetch",
                "read_document",
                "read_xlsx",
                "analyze_csv",
                "think"
            ]
        );
    }
}
