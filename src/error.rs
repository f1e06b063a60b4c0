//! Engine Error Handling
//!
//! Run-level error types for the research engine. Uses thiserror for
//! ergonomic error definitions.
//!
//! The taxonomy follows the run lifecycle: cancellation propagates untouched
//! and fails the run closed; model failures are attributed to the phase they
//! occurred in; tool failures never appear here at all, since they are
//! surfaced into the conversation as strings so the model can self-correct.

use drafthorse_core::CoreError;
use drafthorse_llm::LlmError;
use thiserror::Error;

/// The phase of a research run, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Query-to-brief expansion
    Brief,
    /// Prior-only initial draft
    InitialDraft,
    /// A diffusion iteration (1-based)
    Iteration(usize),
    /// Draft refinement
    RefineDraft,
    /// Transcript compression
    Compression,
    /// Final report synthesis
    FinalReport,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Brief => write!(f, "brief"),
            RunPhase::InitialDraft => write!(f, "initial_draft"),
            RunPhase::Iteration(n) => write!(f, "iteration-{}", n),
            RunPhase::RefineDraft => write!(f, "refine_draft"),
            RunPhase::Compression => write!(f, "compression"),
            RunPhase::FinalReport => write!(f, "final_report"),
        }
    }
}

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The run was cancelled externally
    #[error("research run cancelled")]
    Cancelled,

    /// A deadline elapsed before the run finished
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// A run phase failed; carries the phase and the underlying cause
    #[error("{phase} failed: {cause}")]
    Phase { phase: RunPhase, cause: String },

    /// A sub-researcher failed outright (empty model response, transport loss)
    #[error("sub-researcher {number} failed: {cause}")]
    Researcher { number: usize, cause: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors bubbled up from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a phase failure
    pub fn phase(phase: RunPhase, cause: impl Into<String>) -> Self {
        Self::Phase {
            phase,
            cause: cause.into(),
        }
    }

    /// Wrap an LLM error with the phase it occurred in
    pub fn llm(phase: RunPhase, err: &LlmError) -> Self {
        Self::Phase {
            phase,
            cause: err.to_string(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error should abort a parallel batch outright instead of
    /// degrading into an in-conversation error string.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded(_))
    }

    /// The failing phase for user-visible reporting, when attributable.
    pub fn failing_phase(&self) -> Option<String> {
        match self {
            Self::Phase { phase, .. } => Some(phase.to_string()),
            Self::Cancelled => Some("cancelled".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Brief.to_string(), "brief");
        assert_eq!(RunPhase::Iteration(3).to_string(), "iteration-3");
        assert_eq!(RunPhase::FinalReport.to_string(), "final_report");
    }

    #[test]
    fn test_phase_error_display() {
        let err = EngineError::phase(RunPhase::RefineDraft, "rate limited");
        assert_eq!(err.to_string(), "refine_draft failed: rate limited");
    }

    #[test]
    fn test_is_cancellation() {
        assert!(EngineError::Cancelled.is_cancellation());
        assert!(EngineError::DeadlineExceeded("30s".to_string()).is_cancellation());
        assert!(!EngineError::internal("bug").is_cancellation());
    }

    #[test]
    fn test_failing_phase() {
        let err = EngineError::phase(RunPhase::Iteration(2), "boom");
        assert_eq!(err.failing_phase().as_deref(), Some("iteration-2"));
        assert_eq!(
            EngineError::Cancelled.failing_phase().as_deref(),
            Some("cancelled")
        );
        assert!(EngineError::internal("x").failing_phase().is_none());
    }

    #[test]
    fn test_llm_error_wrapping() {
        let llm_err = LlmError::EmptyResponse;
        let err = EngineError::llm(RunPhase::Brief, &llm_err);
        assert!(err.to_string().contains("brief failed"));
        assert!(err.to_string().contains("no choices"));
    }
}
