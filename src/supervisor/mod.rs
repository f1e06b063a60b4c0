//! Supervisor Diffusion Loop
//!
//! The single owner of run state. The supervisor drives four phases: brief,
//! prior-only initial draft, the diffusion loop (fan out research, refine
//! the draft, decide completion), and final synthesis.
//!
//! Concurrency contract: sub-researchers are spawned with researcher numbers
//! assigned in appearance order BEFORE spawning, bounded by a semaphore, and
//! their results are integrated strictly in slot order by the supervisor
//! task. Nothing else writes `SupervisorState`.

mod prompts;
mod refiner;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use drafthorse_core::{EventSink, ResearchEvent, ResearchNote, ResearchRecord, SubInsight};
use drafthorse_llm::{LlmError, LlmProvider, Message, UsageStats};
use drafthorse_tools::{format_tool_error, format_tool_result, names, parse_tool_calls};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, RunPhase};
use crate::researcher::{ResearchFinding, Researcher};

pub use refiner::dedup_notes;

/// All accumulated state of one research run. Owned and mutated only by the
/// supervisor task.
#[derive(Debug, Default)]
pub struct SupervisorState {
    /// The immutable research brief
    pub brief: String,
    /// The evolving draft; replaced atomically by refinement
    pub draft: String,
    /// Compressed notes, in integration order (append-only)
    pub notes: Vec<ResearchNote>,
    /// Raw tool outputs for provenance (append-only)
    pub raw_notes: Vec<String>,
    /// Unique web URLs observed in any raw note (grows monotonically)
    pub visited_urls: Vec<String>,
    /// Extracted insights with assigned IDs (append-only)
    pub sub_insights: Vec<SubInsight>,
    /// Diffusion conversation history (assistant/user turns)
    pub messages: Vec<Message>,
    /// Completed diffusion iterations
    pub iterations: usize,
    /// Accumulated token usage across every model call in the run
    pub usage: UsageStats,
    /// Per-run monotonic insight ID counter
    insight_counter: usize,
    /// URL count at the last refinement, for progress reporting
    urls_at_last_refine: usize,
}

impl SupervisorState {
    fn new(brief: String, draft: String) -> Self {
        Self {
            brief,
            draft,
            ..Self::default()
        }
    }

    /// Assign the next per-run insight ID.
    fn next_insight_id(&mut self) -> String {
        self.insight_counter += 1;
        format!("insight-{:03}", self.insight_counter)
    }
}

/// The research supervisor.
pub struct Supervisor {
    provider: Arc<dyn LlmProvider>,
    researcher: Arc<dyn Researcher>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl Supervisor {
    /// Create a supervisor over a provider and a researcher factory.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        researcher: Arc<dyn Researcher>,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            researcher,
            events,
            config: config.normalized(),
        }
    }

    /// Run one research query end to end.
    ///
    /// Cancellation aborts outstanding model and tool calls and returns
    /// `EngineError::Cancelled`; partially-collected batch results are
    /// discarded.
    pub async fn coordinate(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> EngineResult<ResearchRecord> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        tracing::info!(%run_id, query, "research run starting");

        match self.run(query, &cancel).await {
            Ok(mut record) => {
                record.duration_ms = started.elapsed().as_millis() as u64;
                self.events.publish(ResearchEvent::RunCompleted {
                    duration_ms: record.duration_ms,
                });
                tracing::info!(%run_id, duration_ms = record.duration_ms, "research run complete");
                Ok(record)
            }
            Err(e) => {
                self.events.publish(ResearchEvent::RunFailed {
                    phase: e.failing_phase().unwrap_or_else(|| "internal".to_string()),
                    message: e.to_string(),
                });
                tracing::warn!(%run_id, error = %e, "research run failed");
                Err(e)
            }
        }
    }

    async fn run(&self, query: &str, cancel: &CancellationToken) -> EngineResult<ResearchRecord> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Phase 1: brief.
        let (brief, usage) = self
            .chat_phase(
                RunPhase::Brief,
                vec![
                    Message::system(prompts::BRIEF_SYSTEM_PROMPT),
                    Message::user(query),
                ],
                cancel,
            )
            .await?;

        // Phase 2: prior-only initial draft.
        let (draft, draft_usage) = self
            .chat_phase(
                RunPhase::InitialDraft,
                vec![
                    Message::system(prompts::INITIAL_DRAFT_SYSTEM_PROMPT),
                    Message::user(brief.clone()),
                ],
                cancel,
            )
            .await?;

        let mut state = SupervisorState::new(brief, draft);
        state.usage.add(&usage);
        state.usage.add(&draft_usage);

        // Phase 3: diffusion loop.
        self.diffusion_loop(&mut state, cancel).await?;

        // Phase 4: final synthesis.
        let final_report = self.synthesize_final_report(&mut state, cancel).await?;

        Ok(ResearchRecord {
            query: query.to_string(),
            brief: state.brief,
            notes: state.notes,
            draft_report: state.draft,
            final_report,
            sub_insights: state.sub_insights,
            duration_ms: 0,
        })
    }

    /// The diffusion loop: each iteration asks the model for tool calls,
    /// runs sequential tools first, then the parallel research batch, and
    /// feeds all results back as one user message.
    async fn diffusion_loop(
        &self,
        state: &mut SupervisorState,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        loop {
            if state.iterations >= self.config.max_iterations {
                tracing::info!(
                    iterations = state.iterations,
                    "iteration cap reached; terminating diffusion"
                );
                return Ok(());
            }
            state.iterations += 1;
            let iteration = state.iterations;
            debug_assert!(iteration <= self.config.max_iterations);

            self.events
                .publish(ResearchEvent::IterationStarted { iteration });

            let mut messages = vec![
                Message::system(prompts::SUPERVISOR_SYSTEM_PROMPT),
                Message::user(prompts::build_iteration_context(
                    &state.brief,
                    &state.draft,
                    state.notes.len(),
                )),
            ];
            messages.extend(state.messages.iter().cloned());

            let (content, usage) = self
                .chat_phase(RunPhase::Iteration(iteration), messages, cancel)
                .await?;
            state.usage.add(&usage);

            let calls = parse_tool_calls(&content);
            state.messages.push(Message::assistant(content));

            // Empty tool-call set is a termination signal.
            if calls.is_empty() {
                tracing::info!(iteration, "no tool calls; terminating diffusion");
                return Ok(());
            }

            // Completion wins over every other call in the same response.
            if calls.iter().any(|c| c.tool == names::RESEARCH_COMPLETE) {
                tracing::info!(iteration, "research_complete signalled");
                return Ok(());
            }

            // Partition: conduct_research calls form the parallel batch, all
            // others run sequentially first.
            let mut topics: Vec<String> = Vec::new();
            let mut sequential = Vec::new();
            for call in calls {
                if call.tool == names::CONDUCT_RESEARCH {
                    match call.str_arg("topic") {
                        Some(topic) => topics.push(topic.to_string()),
                        None => sequential.push(call),
                    }
                } else {
                    sequential.push(call);
                }
            }

            let mut results: Vec<String> = Vec::new();
            for call in &sequential {
                let result = match call.tool.as_str() {
                    names::REFINE_DRAFT => self.refine_draft(state, iteration, cancel).await?,
                    names::THINK => format_tool_result(names::THINK, "Reflection recorded."),
                    names::CONDUCT_RESEARCH => {
                        format_tool_error(names::CONDUCT_RESEARCH, "Missing 'topic' argument")
                    }
                    other => format_tool_error(other, "not available to the supervisor"),
                };
                results.push(result);
            }

            results.extend(
                self.run_research_batch(state, topics, iteration, cancel)
                    .await?,
            );

            state
                .messages
                .push(Message::user(results.join("\n\n---\n\n")));
        }
    }

    /// Run one parallel research batch.
    ///
    /// Researcher numbers are assigned in appearance order before spawning;
    /// a semaphore bounds concurrency; results are collected over a channel
    /// and integrated in slot order. Cancellation or deadline errors abort
    /// integration and propagate.
    async fn run_research_batch(
        &self,
        state: &mut SupervisorState,
        topics: Vec<String>,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<String>> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let batch_len = topics.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let (tx, mut rx) = mpsc::channel::<(usize, EngineResult<ResearchFinding>)>(batch_len);

        for (slot, topic) in topics.iter().enumerate() {
            let researcher_number = slot + 1;
            self.events.publish(ResearchEvent::ResearchDelegated {
                topic: topic.clone(),
                researcher_number,
                iteration,
            });

            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let researcher = self.researcher.clone();
            let cancel = cancel.clone();
            let topic = topic.clone();

            tokio::spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => {
                        if cancel.is_cancelled() {
                            Err(EngineError::Cancelled)
                        } else {
                            researcher
                                .research(&topic, researcher_number, iteration, &cancel)
                                .await
                        }
                    }
                    Err(_) => Err(EngineError::internal("research semaphore closed")),
                };
                let _ = tx.send((slot, result)).await;
            });
        }
        drop(tx);

        // Join the whole batch, then integrate in slot order.
        let mut slots: Vec<Option<EngineResult<ResearchFinding>>> =
            (0..batch_len).map(|_| None).collect();
        while let Some((slot, result)) = rx.recv().await {
            slots[slot] = Some(result);
        }

        let mut outputs = Vec::with_capacity(batch_len);
        for (slot, entry) in slots.into_iter().enumerate() {
            let result =
                entry.unwrap_or_else(|| Err(EngineError::internal("researcher task vanished")));
            match result {
                Ok(finding) => outputs.push(self.integrate_finding(state, finding, iteration)),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    tracing::warn!(slot = slot + 1, error = %e, "sub-researcher failed");
                    outputs.push(format_tool_error(
                        names::CONDUCT_RESEARCH,
                        &format!("researcher {}: {}", slot + 1, e),
                    ));
                }
            }
        }
        Ok(outputs)
    }

    /// Fold one finding into supervisor state, in the supervisor task.
    fn integrate_finding(
        &self,
        state: &mut SupervisorState,
        finding: ResearchFinding,
        iteration: usize,
    ) -> String {
        for raw in &finding.raw_notes {
            state.raw_notes.push(raw.clone());
        }
        for link in &finding.visited_urls {
            if !state.visited_urls.contains(link) {
                state.visited_urls.push(link.clone());
            }
        }
        for mut insight in finding.insights {
            insight.id = state.next_insight_id();
            state.sub_insights.push(insight);
        }
        state.usage.add(&finding.usage);

        state.notes.push(ResearchNote {
            topic: finding.topic.clone(),
            researcher_number: finding.researcher_number,
            iteration,
            content: finding.compressed.clone(),
            urls: finding.visited_urls.clone(),
        });

        format_tool_result(
            names::CONDUCT_RESEARCH,
            &format!(
                "Researcher {} findings on \"{}\" ({} sources):\n\n{}",
                finding.researcher_number,
                finding.topic,
                finding.sources.len(),
                finding.compressed
            ),
        )
    }

    /// One model call attributed to a run phase.
    async fn chat_phase(
        &self,
        phase: RunPhase,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> EngineResult<(String, UsageStats)> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.provider.chat(messages) => {
                result.map_err(|e| EngineError::llm(phase, &e))?
            }
        };
        let usage = response.usage;
        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok((content.to_string(), usage)),
            _ => Err(EngineError::llm(phase, &LlmError::EmptyResponse)),
        }
    }
}
