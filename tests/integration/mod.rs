//! Integration suite for the research engine.
//!
//! Every scenario runs against scripted providers and mock tools; nothing
//! here touches the network.

mod research_flow;
mod supervisor_batch;
mod support;
