//! Research Data Model
//!
//! Record types shared between the supervisor, the sub-researchers, and the
//! persistence layer. Everything here is a value type: sub-researchers build
//! these and hand them back to the supervisor, which is the only writer of
//! accumulated state.

use serde::{Deserialize, Serialize};

/// Where a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A web page reached over HTTP
    Web,
    /// A local document (PDF, DOCX, spreadsheet, CSV)
    Document,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Web => write!(f, "web"),
            SourceType::Document => write!(f, "document"),
        }
    }
}

/// A retrieved source, kept verbatim for provenance.
///
/// Referenced by [`SubInsight`]s; never mutated after capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// Absolute URL for web sources, `file://` path for documents
    pub url: String,
    /// Source classification
    pub source_type: SourceType,
    /// Title as reported by the retrieval tool
    pub title: String,
    /// Short excerpt used when building findings
    pub excerpt: String,
    /// Raw retrieved content (possibly truncated by the tool)
    pub raw_content: String,
    /// RFC3339 timestamp of retrieval
    pub fetched_at: String,
}

/// A structured, source-attributed finding extracted from raw tool output.
///
/// Immutable once recorded. IDs (`insight-NNN`) are assigned by the
/// supervisor when the finding is integrated, so they are monotonic across
/// the whole run regardless of which sub-researcher produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubInsight {
    /// Stable per-run ID, `insight-NNN`
    pub id: String,
    /// Research topic this finding answers
    pub topic: String,
    /// Short title for the finding
    pub title: String,
    /// The finding text itself
    pub finding: String,
    /// Optional implication derived from the finding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implication: Option<String>,
    /// Source URL (`https?://…`) or `file://` path for documents
    pub source_url: String,
    /// Web or document
    pub source_type: SourceType,
    /// Raw excerpt the finding was extracted from
    pub raw_excerpt: String,
    /// Ordered analysis chain: topic -> tool -> query/file -> source -> finding
    pub analysis_chain: Vec<String>,
    /// Tool that produced the underlying raw note, when detectable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    /// Query or document path fed to that tool, when detectable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_used: Option<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Diffusion iteration the finding originated in
    pub iteration: usize,
    /// Researcher number within that iteration's fan-out
    pub researcher_number: usize,
    /// RFC3339 timestamp of extraction
    pub timestamp: String,
}

/// One sub-researcher's compressed finding, appended to supervisor state.
///
/// The content preserves retrieved statements verbatim with inline citations
/// and a trailing source list; `urls` is the set of web URLs the note cites,
/// used for deduplication before final synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchNote {
    /// The topic this note answers
    pub topic: String,
    /// Researcher number assigned before spawning, in appearance order
    pub researcher_number: usize,
    /// Diffusion iteration that delegated the topic
    pub iteration: usize,
    /// The compressed finding text
    pub content: String,
    /// Unique web URLs cited by this note
    pub urls: Vec<String>,
}

/// The persisted artifact of one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRecord {
    /// The original user query
    pub query: String,
    /// The generated research brief
    pub brief: String,
    /// All compressed notes, in integration order
    pub notes: Vec<ResearchNote>,
    /// The draft as it stood when diffusion terminated
    pub draft_report: String,
    /// The final synthesized report with global citations
    pub final_report: String,
    /// All extracted insights, in ID order
    pub sub_insights: Vec<SubInsight>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}
