//! Sub-Researcher
//!
//! A bounded, single-topic research agent: seeded with one topic, it loops
//! through model turns, executes the tool calls the model emits, and feeds
//! results back until the model answers, the budget runs out, or the run is
//! cancelled. The transcript is then compressed into a cited note and mined
//! for structured insights.
//!
//! Sub-researchers are stateless with respect to each other and return
//! values to the supervisor; they never touch shared state.

mod compression;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use drafthorse_core::{EventSink, ResearchEvent, ResearcherStage, SourceReference, SubInsight};
use drafthorse_llm::{LlmProvider, Message, UsageStats};
use drafthorse_tools::{
    build_tool_call_instructions, format_tool_error, format_tool_result, names, parse_tool_calls,
    ToolRegistry,
};

use crate::config::ResearcherConfig;
use crate::error::{EngineError, EngineResult};
use crate::insights::{extract_insights, extract_source_references, extract_urls};
use crate::tools::is_data_tool;

/// What one sub-researcher hands back to the supervisor.
#[derive(Debug, Clone)]
pub struct ResearchFinding {
    /// The topic that was researched
    pub topic: String,
    /// Researcher number assigned before spawning
    pub researcher_number: usize,
    /// The compressed, cited findings document
    pub compressed: String,
    /// Raw tool outputs, in execution order
    pub raw_notes: Vec<String>,
    /// Unique web URLs observed across the raw notes
    pub visited_urls: Vec<String>,
    /// Retrieved sources, kept verbatim for provenance
    pub sources: Vec<SourceReference>,
    /// Extracted insights (IDs assigned by the supervisor at integration)
    pub insights: Vec<SubInsight>,
    /// Token usage across the loop and compression
    pub usage: UsageStats,
}

/// Narrow interface the supervisor drives research through.
///
/// Keeps the supervisor agnostic of tool sets and model handles; the
/// implementation owns both.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Research one topic to completion.
    async fn research(
        &self,
        topic: &str,
        researcher_number: usize,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<ResearchFinding>;
}

/// Per-invocation working state of one sub-researcher.
#[derive(Debug, Default)]
struct ResearcherState {
    raw_notes: Vec<String>,
    usage: UsageStats,
}

/// The standard tool-calling sub-researcher.
pub struct SubResearcher {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: ResearcherConfig,
    events: Arc<dyn EventSink>,
}

impl SubResearcher {
    /// Create a sub-researcher over a provider and tool set.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: ResearcherConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
            events,
        }
    }

    /// Build the per-topic system prompt: date, budgets, stop conditions,
    /// and the tool-call grammar.
    fn build_system_prompt(&self) -> String {
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let budget = self.config.max_iterations;

        format!(
            r#"You are a research assistant investigating a single topic with tools. Today's date is {date}.

Budget:
- Use 2-3 searches for a simple topic, up to 5 for a complex one.
- Hard stop after {budget} tool-calling rounds; make every call count.
- Call `think` after each retrieval to note what you learned and what is missing.

Stop early and write your answer when ANY of these hold:
- You can answer the topic comprehensively.
- You have gathered 3 or more relevant sources.
- Your last two searches returned similar information.

When you are done, reply with your findings as plain text and no tool calls. Include every fact you gathered with its source URL.

{tool_instructions}"#,
            date = date,
            budget = budget,
            tool_instructions = build_tool_call_instructions(&self.tools),
        )
    }

    fn stage_for_tool(tool: &str) -> ResearcherStage {
        match tool {
            names::SEARCH => ResearcherStage::Searching,
            names::THINK => ResearcherStage::Thinking,
            other => ResearcherStage::UsingTool {
                tool: other.to_string(),
            },
        }
    }

    fn emit(&self, researcher_number: usize, stage: ResearcherStage) {
        self.events.publish(ResearchEvent::ResearcherProgress {
            researcher_number,
            stage,
        });
    }
}

#[async_trait]
impl Researcher for SubResearcher {
    async fn research(
        &self,
        topic: &str,
        researcher_number: usize,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<ResearchFinding> {
        let mut state = ResearcherState::default();
        let mut messages = vec![
            Message::system(self.build_system_prompt()),
            Message::user(format!("Research this topic thoroughly: {}", topic)),
        ];

        self.emit(researcher_number, ResearcherStage::Starting);
        tracing::info!(topic, researcher_number, iteration, "sub-researcher starting");

        for round in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                result = self.provider.chat(messages.clone()) => result.map_err(|e| {
                    EngineError::Researcher {
                        number: researcher_number,
                        cause: e.to_string(),
                    }
                })?,
            };
            state.usage.add(&response.usage);

            let Some(content) = response.first_content().map(str::to_string) else {
                return Err(EngineError::Researcher {
                    number: researcher_number,
                    cause: "model returned no choices".to_string(),
                });
            };

            let calls = parse_tool_calls(&content);
            messages.push(Message::assistant(content));

            if calls.is_empty() {
                tracing::debug!(researcher_number, round, "model is answering; loop done");
                break;
            }

            for call in calls {
                self.emit(researcher_number, Self::stage_for_tool(&call.tool));

                let executed = tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    result = self.tools.execute(&call.tool, call.args.clone()) => result,
                };

                match executed {
                    Ok(text) => {
                        if is_data_tool(&call.tool) {
                            state.raw_notes.push(text.clone());
                        }
                        messages.push(Message::user(format_tool_result(&call.tool, &text)));
                    }
                    Err(error) => {
                        tracing::debug!(tool = %call.tool, %error, "tool failed; surfacing to model");
                        messages.push(Message::user(format_tool_error(&call.tool, &error)));
                    }
                }
            }
        }

        // Compression; degrade to raw notes when the model call fails.
        self.emit(researcher_number, ResearcherStage::Compressing);
        let compressed = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = compression::compress_findings(&self.provider, &messages, topic) => {
                match result {
                    Ok((compressed, usage)) => {
                        state.usage.add(&usage);
                        compressed
                    }
                    Err(e) => {
                        tracing::warn!(researcher_number, "compression failed ({}); returning raw notes", e);
                        state.raw_notes.join("\n\n---\n\n")
                    }
                }
            }
        };

        let mut visited_urls = Vec::new();
        for note in &state.raw_notes {
            for link in extract_urls(note) {
                if !visited_urls.contains(&link) {
                    visited_urls.push(link);
                }
            }
        }

        let sources: Vec<SourceReference> = state
            .raw_notes
            .iter()
            .flat_map(|note| extract_source_references(note))
            .collect();

        let insights: Vec<SubInsight> = state
            .raw_notes
            .iter()
            .flat_map(|note| extract_insights(note, topic, iteration, researcher_number))
            .collect();

        self.emit(researcher_number, ResearcherStage::Complete);
        tracing::info!(
            researcher_number,
            raw_notes = state.raw_notes.len(),
            urls = visited_urls.len(),
            insights = insights.len(),
            "sub-researcher complete"
        );

        Ok(ResearchFinding {
            topic: topic.to_string(),
            researcher_number,
            compressed,
            raw_notes: state.raw_notes,
            visited_urls,
            sources,
            insights,
            usage: state.usage,
        })
    }
}
