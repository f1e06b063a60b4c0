//! Supervisor Prompts
//!
//! The prompt contracts for the four run phases. The diffusion system prompt
//! encodes the algorithm itself: the model is told exactly when to fan out
//! research, when to refine, and when to declare completion, all through the
//! same tool-call grammar the parser consumes.

/// System prompt for the query-to-brief expansion.
pub const BRIEF_SYSTEM_PROMPT: &str = r#"You write research briefs. Transform the user's query into an explicit research brief that states:
- The precise research question being answered.
- Scope and constraints: what must be investigated specifically, what may be left open.
- Preferred source classes (primary documentation, standards, peer-reviewed work, reputable press) and source classes to avoid.
- How to handle dimensions the user left unstated: keep them open rather than assuming.

Output only the brief as plain text."#;

/// System prompt for the prior-only initial draft.
pub const INITIAL_DRAFT_SYSTEM_PROMPT: &str = r#"You draft research reports from your own prior knowledge, without retrieval.

Write a structured markdown report answering the brief. Use section headings. Where you are unsure or your knowledge may be stale, write the placeholder [NEEDS RESEARCH] in place of the uncertain claim. Outdated information is acceptable here; it will be corrected against retrieved evidence later.

Output only the draft report."#;

/// System prompt for the diffusion loop.
pub const SUPERVISOR_SYSTEM_PROMPT: &str = r#"You are the research supervisor running an iterative denoising loop over a draft report.

Each turn, follow this algorithm:
1. Compare the current draft and the accumulated research notes against the brief, and identify the most important information gaps.
2. For each gap, call `conduct_research` with a focused topic. Call it multiple times in one turn to research topics in parallel.
3. When notes have accumulated since the last refinement, call `refine_draft` to incorporate them into the draft.
4. Call `research_complete` ONLY when diverse, newly-framed queries stop yielding new findings. Judge completion by evidence saturation, never by how polished the draft looks.

You may call `think` to reason privately before deciding.

## Tool Calling

To use a tool, output a tool call block in this EXACT format:

```tool_call
{"tool": "tool_name", "arguments": {"param": "value"}}
```

IMPORTANT:
- The block MUST start with ```tool_call and end with ```
- The JSON MUST be valid
- You can make multiple tool calls in a single response
- After making tool calls, STOP and WAIT for the results

## Available Tools

- `conduct_research`: Delegate one focused topic to a parallel researcher. Arguments: {"topic": "..."}
- `refine_draft`: Rewrite the draft, incorporating all accumulated research notes. Arguments: {}
- `research_complete`: Declare the research saturated and finish. Arguments: {}
- `think`: Record private reasoning. Arguments: {"thought": "..."}"#;

/// System prompt for the draft refinement call.
pub const REFINE_SYSTEM_PROMPT: &str = r#"You revise research reports against evidence.

Rewrite the draft so that every claim is consistent with the research findings provided. Replace [NEEDS RESEARCH] placeholders and stale claims with findings, keeping the findings' inline citations. Preserve the draft's overall structure unless the evidence demands reorganization. Do not drop sections.

Output only the complete revised report."#;

/// Build the recurring user context for a diffusion turn.
pub fn build_iteration_context(brief: &str, draft: &str, note_count: usize) -> String {
    format!(
        "## Research Brief\n\n{}\n\n## Current Draft\n\n{}\n\n## Status\n\nAccumulated research notes: {}",
        brief, draft, note_count
    )
}

/// Build the user message for a refinement call.
pub fn build_refine_request(brief: &str, draft: &str, findings: &str) -> String {
    format!(
        "## Research Brief\n\n{}\n\n## Current Draft\n\n{}\n\n## Research Findings\n\n{}\n\nRevise the draft now.",
        brief, draft, findings
    )
}

/// System prompt for the final synthesis call, with the citation rules.
pub const FINAL_REPORT_SYSTEM_PROMPT: &str = r####"You write final research reports.

Insightfulness rules:
- Go beyond listing facts: connect findings, explain mechanisms, and state implications the evidence supports.
- Surface disagreements between sources instead of papering over them.

Helpfulness rules:
- Answer the brief directly and completely. Structure the report for a reader who has not seen the research notes.
- Keep the report self-contained; never reference "the notes" or "the draft".

Citation rules:
- Assign exactly one number per unique URL, in order of first use: [1], [2], ...
- Numbers must be sequential with no gaps, and every number must be used at least once in the body.
- End the report with a "### Sources" section listing each number with its URL, one per line.

Output only the final report."####;

/// Build the user message for the final synthesis call.
pub fn build_final_report_request(brief: &str, findings: &str, draft: &str) -> String {
    format!(
        "## Research Brief\n\n{}\n\n## Research Findings (deduplicated)\n\n{}\n\n## Refined Draft\n\n{}\n\nWrite the final report now.",
        brief, findings, draft
    )
}
