//! Drafthorse Tools
//!
//! The tool-calling layer of the research engine:
//!
//! - `parser` - the tool-call grammar: fenced blocks in model output are
//!   parsed into ordered, structured `ToolCall` records
//! - `registry` - the `ResearchTool` trait and an insertion-ordered registry
//! - `instructions` - renders the grammar and tool list into a system-prompt
//!   fragment so the grammar is a contract, not model creativity

pub mod instructions;
pub mod parser;
pub mod registry;

pub use instructions::build_tool_call_instructions;
pub use parser::{parse_tool_calls, strip_tool_calls, ToolCall};
pub use registry::{format_tool_error, format_tool_result, ResearchTool, ToolRegistry};

/// The closed set of tool names the engine recognizes.
pub mod names {
    /// Supervisor: delegate a topic to a parallel sub-researcher
    pub const CONDUCT_RESEARCH: &str = "conduct_research";
    /// Supervisor: incorporate accumulated notes into the draft
    pub const REFINE_DRAFT: &str = "refine_draft";
    /// Supervisor: signal evidence saturation
    pub const RESEARCH_COMPLETE: &str = "research_complete";
    /// Record a reflection without external effect
    pub const THINK: &str = "think";
    /// Web search
    pub const SEARCH: &str = "search";
    /// Fetch a URL as plain text
    pub const FETCH: &str = "fetch";
    /// Read a local document by extension dispatch
    pub const READ_DOCUMENT: &str = "read_document";
    /// Preview a spreadsheet
    pub const READ_XLSX: &str = "read_xlsx";
    /// Profile a CSV file
    pub const ANALYZE_CSV: &str = "analyze_csv";
}
