//! Progress Event Definitions
//!
//! Typed progress events emitted by the supervisor and sub-researchers, and
//! the sink contract consumers implement to receive them. The consumer is
//! untrusted and slow-tolerated: publishing must never block the research
//! loop, so sinks drop events under backpressure rather than wait.

use serde::{Deserialize, Serialize};

/// Stage a sub-researcher is currently in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ResearcherStage {
    /// Conversation seeded, first model call pending
    Starting,
    /// Executing a search query
    Searching,
    /// Recording a reflection
    Thinking,
    /// Executing a non-search tool
    UsingTool { tool: String },
    /// Compressing the transcript into a note
    Compressing,
    /// Finding returned to the supervisor
    Complete,
}

/// Progress events for one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResearchEvent {
    /// A diffusion iteration began
    IterationStarted { iteration: usize },
    /// The supervisor delegated a topic to a sub-researcher
    ResearchDelegated {
        topic: String,
        researcher_number: usize,
        iteration: usize,
    },
    /// A sub-researcher changed stage
    ResearcherProgress {
        researcher_number: usize,
        #[serde(flatten)]
        stage: ResearcherStage,
    },
    /// The draft was refined with accumulated notes
    DraftRefined {
        iteration: usize,
        sections_touched: Vec<String>,
        new_sources: usize,
    },
    /// Final synthesis started
    FinalReportStarted,
    /// Final synthesis finished
    FinalReportCompleted { unique_sources: usize },
    /// The run finished successfully
    RunCompleted { duration_ms: u64 },
    /// The run failed
    RunFailed { phase: String, message: String },
}

/// Sink for research progress events.
///
/// `publish` must not block: implementations either handle the event
/// immediately or drop it. Progress reporting never fails a run.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Non-blocking; may drop under backpressure.
    fn publish(&self, event: ResearchEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ResearchEvent) {}
}
