//! Drafthorse
//!
//! A test-time diffusion research engine. A supervisor drafts a report from
//! model priors, then iteratively "denoises" it against evidence gathered by
//! bounded, parallel sub-researchers, and finally synthesizes a cited
//! report.
//!
//! The pipeline: `Query -> Brief -> Initial Draft -> { identify gaps ->
//! fan out sub-researchers -> refine draft }* -> Final Report`.
//!
//! Key pieces:
//! - [`supervisor::Supervisor`] owns all run state and drives the loop
//! - [`researcher::SubResearcher`] answers one topic with tools and returns
//!   a compressed, cited finding
//! - [`insights`] extracts structured, source-attributed findings from raw
//!   tool output
//! - [`tools`] hosts the search/fetch/document/CSV adapters
//! - [`vault::ResearchVault`] optionally persists finished runs

pub mod config;
pub mod error;
pub mod events;
pub mod insights;
pub mod researcher;
pub mod supervisor;
pub mod tools;
pub mod vault;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, RunPhase};
pub use researcher::{ResearchFinding, Researcher, SubResearcher};
pub use supervisor::{dedup_notes, Supervisor, SupervisorState};
