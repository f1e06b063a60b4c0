//! Drafthorse Core
//!
//! Foundation crate for the Drafthorse research engine. Holds the pieces the
//! other crates agree on:
//!
//! - `error` - dependency-light error types shared across the workspace
//! - `research` - the research data model (notes, insights, sources, run records)
//! - `events` - typed progress events and the event sink contract
//!
//! This crate stays light on dependencies (serde, thiserror, chrono) so that
//! provider and tool crates can depend on it without pulling in the engine's
//! network or document stack.

pub mod error;
pub mod events;
pub mod research;

pub use error::{CoreError, CoreResult};
pub use events::{EventSink, NullSink, ResearchEvent, ResearcherStage};
pub use research::{ResearchNote, ResearchRecord, SourceReference, SourceType, SubInsight};
