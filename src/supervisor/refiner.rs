//! Draft Refinement and Final Synthesis
//!
//! The two LLM-driven document mutations: `refine_draft` atomically replaces
//! the draft with a revision incorporating all accumulated notes, and final
//! synthesis produces the report with global citation numbering after notes
//! are URL-deduplicated.

use tokio_util::sync::CancellationToken;

use drafthorse_core::{ResearchEvent, ResearchNote};
use drafthorse_llm::Message;
use drafthorse_tools::{format_tool_result, names};

use super::{prompts, Supervisor, SupervisorState};
use crate::error::{EngineResult, RunPhase};

/// Separator between notes in findings blobs
const NOTE_SEPARATOR: &str = "\n\n---\n\n";

impl Supervisor {
    /// Incorporate all accumulated notes into the draft.
    ///
    /// With no notes this is an advisory no-op: the draft is untouched and
    /// the model gets a string telling it to research first. A model failure
    /// here fails the run; the draft must never be left half-replaced.
    pub(super) async fn refine_draft(
        &self,
        state: &mut SupervisorState,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<String> {
        if state.notes.is_empty() {
            return Ok(format_tool_result(
                names::REFINE_DRAFT,
                "No accumulated research notes yet; draft left unchanged. Conduct research first.",
            ));
        }

        let findings = state
            .notes
            .iter()
            .map(|note| note.content.as_str())
            .collect::<Vec<_>>()
            .join(NOTE_SEPARATOR);

        let (revised, usage) = self
            .chat_phase(
                RunPhase::RefineDraft,
                vec![
                    Message::system(prompts::REFINE_SYSTEM_PROMPT),
                    Message::user(prompts::build_refine_request(
                        &state.brief,
                        &state.draft,
                        &findings,
                    )),
                ],
                cancel,
            )
            .await?;
        state.usage.add(&usage);

        let new_sources = state
            .visited_urls
            .len()
            .saturating_sub(state.urls_at_last_refine);
        state.urls_at_last_refine = state.visited_urls.len();

        self.events.publish(ResearchEvent::DraftRefined {
            iteration,
            sections_touched: markdown_headings(&revised),
            new_sources,
        });
        tracing::info!(iteration, new_sources, "draft refined");

        // Atomic replacement: the draft is a pure function of its
        // predecessor plus the accumulated notes.
        state.draft = revised;

        Ok(format_tool_result(
            names::REFINE_DRAFT,
            "Draft refined with accumulated findings.",
        ))
    }

    /// Produce the final report from the deduplicated notes and the refined
    /// draft.
    pub(super) async fn synthesize_final_report(
        &self,
        state: &mut SupervisorState,
        cancel: &CancellationToken,
    ) -> EngineResult<String> {
        self.events.publish(ResearchEvent::FinalReportStarted);

        let kept = dedup_notes(&state.notes);
        let findings = kept
            .iter()
            .map(|note| note.content.as_str())
            .collect::<Vec<_>>()
            .join(NOTE_SEPARATOR);

        let unique_sources: usize = {
            let mut seen = std::collections::HashSet::new();
            for note in &kept {
                for link in &note.urls {
                    seen.insert(link.as_str());
                }
            }
            seen.len()
        };

        let (report, usage) = self
            .chat_phase(
                RunPhase::FinalReport,
                vec![
                    Message::system(prompts::FINAL_REPORT_SYSTEM_PROMPT),
                    Message::user(prompts::build_final_report_request(
                        &state.brief,
                        &findings,
                        &state.draft,
                    )),
                ],
                cancel,
            )
            .await?;
        state.usage.add(&usage);

        self.events
            .publish(ResearchEvent::FinalReportCompleted { unique_sources });
        tracing::info!(
            kept_notes = kept.len(),
            unique_sources,
            "final report synthesized"
        );

        Ok(report)
    }
}

/// Drop notes whose URL set is a subset of the URLs already seen in kept
/// notes, preserving the first occurrence of each URL.
///
/// Notes without URLs (document-only findings) are always kept; dropping
/// them would silently discard evidence that has no web citation.
pub fn dedup_notes(notes: &[ResearchNote]) -> Vec<ResearchNote> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut kept = Vec::new();

    for note in notes {
        let redundant =
            !note.urls.is_empty() && note.urls.iter().all(|link| seen.contains(link));
        if redundant {
            tracing::debug!(topic = %note.topic, "dropping note with no new sources");
            continue;
        }
        for link in &note.urls {
            seen.insert(link.clone());
        }
        kept.push(note.clone());
    }

    kept
}

/// Collect markdown headings, used to report which sections a refinement
/// touched.
fn markdown_headings(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                Some(trimmed.trim_start_matches('#').trim().to_string())
            } else {
                None
            }
        })
        .filter(|heading| !heading.is_empty())
        .collect()
}
