//! Engine Configuration
//!
//! The closed configuration surface of the research engine. Every knob has a
//! serde default so partial configs deserialize cleanly.

use serde::{Deserialize, Serialize};

/// Safety ceiling for the per-topic research loop. Values above this are
/// clamped at load time.
pub const RESEARCHER_ITERATION_CEILING: usize = 20;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Hard stop for the supervisor diffusion loop
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Maximum parallel sub-researchers per batch
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-topic sub-researcher settings
    #[serde(default)]
    pub researcher: ResearcherConfig,
    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Document reader settings
    #[serde(default)]
    pub documents: DocumentConfig,
}

fn default_max_iterations() -> usize {
    15
}

fn default_max_concurrent() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_concurrent: default_max_concurrent(),
            researcher: ResearcherConfig::default(),
            search: SearchConfig::default(),
            documents: DocumentConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp out-of-range values to safe bounds.
    pub fn normalized(mut self) -> Self {
        if self.max_iterations == 0 {
            self.max_iterations = 1;
        }
        if self.max_concurrent == 0 {
            self.max_concurrent = 1;
        }
        self.researcher.max_iterations = self
            .researcher
            .max_iterations
            .clamp(1, RESEARCHER_ITERATION_CEILING);
        self.search.summarize_count = self.search.summarize_count.min(3);
        self.search.max_results_per_query = self.search.max_results_per_query.clamp(1, 10);
        self
    }
}

/// Per-topic sub-researcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearcherConfig {
    /// Maximum search/analyze/reflect cycles per topic
    #[serde(default = "default_researcher_iterations")]
    pub max_iterations: usize,
}

fn default_researcher_iterations() -> usize {
    5
}

impl Default for ResearcherConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_researcher_iterations(),
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Result cap per query (hard cap 10)
    #[serde(default = "default_max_results")]
    pub max_results_per_query: usize,
    /// Fetch-and-summarize the top results inline
    #[serde(default)]
    pub summarize_top_results: bool,
    /// How many top results to summarize when enabled (hard cap 3)
    #[serde(default = "default_summarize_count")]
    pub summarize_count: usize,
}

fn default_max_results() -> usize {
    10
}

fn default_summarize_count() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results_per_query: default_max_results(),
            summarize_top_results: false,
            summarize_count: default_summarize_count(),
        }
    }
}

/// Document reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentConfig {
    /// Sheets previewed per workbook
    #[serde(default = "default_max_sheets")]
    pub max_sheets: usize,
    /// Rows previewed per sheet
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Columns previewed per row
    #[serde(default = "default_max_cols")]
    pub max_cols: usize,
}

fn default_max_sheets() -> usize {
    3
}

fn default_max_rows() -> usize {
    20
}

fn default_max_cols() -> usize {
    12
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_sheets: default_max_sheets(),
            max_rows: default_max_rows(),
            max_cols: default_max_cols(),
        }
    }
}
