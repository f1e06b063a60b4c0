//! Insight & Citation Extraction
//!
//! Turns raw tool output into structured, source-attributed `SubInsight`
//! records. The pipeline is heuristic: split on `SOURCE n` markers when
//! present, fall back to windows around `URL:` lines, and for document tools
//! (which have no URLs) treat the whole note as one block attributed to the
//! file.

use std::sync::OnceLock;

use regex::Regex;

use drafthorse_core::{SourceReference, SourceType, SubInsight};

/// Window before a URL marker in the fallback block builder
const WINDOW_BEFORE: usize = 100;

/// Window after a URL marker in the fallback block builder
const WINDOW_AFTER: usize = 500;

/// Minimum non-whitespace characters for a block to yield a finding
const MIN_FINDING_CHARS: usize = 20;

/// Finding text cap when no summary is available
const MAX_FINDING_CHARS: usize = 500;

fn url_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"URL:\s*(https?://[^\s"<>]+)"#).expect("valid regex"))
}

fn source_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^---\s*SOURCE\s+\d+(?::\s*(?P<title>.*?))?\s*---\s*$")
            .expect("valid regex")
    })
}

fn title_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:Title:|##)\s*(?P<title>.+)$").expect("valid regex"))
}

/// Extract the unique `URL:`-attributed web URLs from a raw note, in
/// appearance order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for capture in url_line_re().captures_iter(text) {
        let url = capture[1].trim_end_matches(['.', ',', ';', ')']).to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Context detected from a raw note's provenance headers.
#[derive(Debug, Clone, Default)]
struct NoteContext {
    tool: Option<&'static str>,
    query: Option<String>,
    doc_path: Option<String>,
}

impl NoteContext {
    fn source_type(&self) -> SourceType {
        match self.tool {
            Some("read_document") | Some("read_xlsx") | Some("analyze_csv") => {
                SourceType::Document
            }
            _ => SourceType::Web,
        }
    }
}

/// Probe a raw note's header lines for the tool that produced it.
fn detect_note_context(note: &str) -> NoteContext {
    fn probe(note: &str, pattern: &str) -> Option<String> {
        let re = Regex::new(pattern).expect("valid regex");
        re.captures(note)
            .map(|c| c["value"].trim().trim_matches('"').to_string())
    }

    // Workbook implies the spreadsheet reader even though its output also
    // carries a Read document header.
    if note.contains("\nWorkbook:") || note.starts_with("Workbook:") {
        let path = probe(note, r"(?m)^Read document:\s*(?P<value>.+)$");
        return NoteContext {
            tool: Some("read_xlsx"),
            query: path.clone(),
            doc_path: path,
        };
    }
    if let Some(path) = probe(note, r"(?m)^Read document:\s*(?P<value>.+)$") {
        return NoteContext {
            tool: Some("read_document"),
            query: Some(path.clone()),
            doc_path: Some(path),
        };
    }
    if let Some(path) = probe(note, r"(?m)^CSV Analysis:\s*(?P<value>.+)$") {
        return NoteContext {
            tool: Some("analyze_csv"),
            query: Some(path.clone()),
            doc_path: Some(path),
        };
    }
    if let Some(query) = probe(note, r#"(?m)^Search results for:\s*(?P<value>.+?)\s*$"#) {
        return NoteContext {
            tool: Some("search"),
            query: Some(query),
            doc_path: None,
        };
    }
    if let Some(url) = probe(note, r"(?m)^Fetched from:\s*(?P<value>\S+)") {
        return NoteContext {
            tool: Some("fetch"),
            query: Some(url),
            doc_path: None,
        };
    }
    NoteContext::default()
}

/// One candidate evidence block inside a raw note.
#[derive(Debug, Clone)]
struct EvidenceBlock {
    title: Option<String>,
    url: Option<String>,
    summary: Option<String>,
    content: String,
}

/// Split a note on `--- SOURCE n: title ---` markers.
fn split_source_blocks(note: &str) -> Vec<EvidenceBlock> {
    let markers: Vec<(usize, usize, Option<String>)> = source_marker_re()
        .captures_iter(note)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let title = c
                .name("title")
                .map(|t| t.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    let mut blocks = Vec::new();
    for (i, (_, body_start, title)) in markers.iter().enumerate() {
        let body_end = markers
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(note.len());
        let content = note[*body_start..body_end].trim().to_string();

        blocks.push(EvidenceBlock {
            title: title.clone(),
            url: extract_urls(&content).into_iter().next(),
            summary: extract_summary(&content),
            content,
        });
    }
    blocks
}

/// Fallback: build a window around each `URL:` line, clipped at the next one.
fn url_window_blocks(note: &str) -> Vec<EvidenceBlock> {
    let matches: Vec<(usize, usize, String)> = url_line_re()
        .captures_iter(note)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let url = c[1].trim_end_matches(['.', ',', ';', ')']).to_string();
            Some((whole.start(), whole.end(), url))
        })
        .collect();

    let mut blocks = Vec::new();
    for (i, (start, end, url)) in matches.iter().enumerate() {
        let block_start = floor_char_boundary(note, start.saturating_sub(WINDOW_BEFORE));
        let mut block_end = ceil_char_boundary(note, (*end + WINDOW_AFTER).min(note.len()));
        if let Some((next_start, _, _)) = matches.get(i + 1) {
            block_end = block_end.min(*next_start);
        }
        let content = note[block_start..block_end].trim().to_string();

        blocks.push(EvidenceBlock {
            title: None,
            url: Some(url.clone()),
            summary: extract_summary(&content),
            content,
        });
    }
    blocks
}

/// Pull a `SUMMARY:` body out of a block, ended by a blank line, a rule, or
/// the end of the block.
fn extract_summary(block: &str) -> Option<String> {
    let start = block.find("SUMMARY:")? + "SUMMARY:".len();
    let rest = &block[start..];
    let end = rest
        .find("\n\n")
        .into_iter()
        .chain(rest.find("\n---"))
        .min()
        .unwrap_or(rest.len());
    let summary = rest[..end].trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary.to_string())
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Truncate to a character budget without splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Domains whose findings start with a confidence bonus.
const TRUSTED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "arxiv.org",
    "biorxiv.org",
    "nature.com",
    "science.org",
    "sciencedirect.com",
    "springer.com",
    "ieee.org",
    "acm.org",
    "nih.gov",
    "doi.org",
];

fn is_trusted_domain(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    if host.ends_with(".gov") || host.ends_with(".edu") {
        return true;
    }
    TRUSTED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Score a finding: 0.5 base, +0.2 trusted source, +0.1 substantial text.
fn score_confidence(source_url: &str, finding: &str) -> f64 {
    let mut confidence: f64 = 0.5;
    if is_trusted_domain(source_url) {
        confidence += 0.2;
    }
    if finding.chars().count() > 200 {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

/// Split a raw note into evidence blocks plus the detected tool context.
fn evidence_blocks(raw_note: &str) -> (Vec<EvidenceBlock>, NoteContext) {
    let ctx = detect_note_context(raw_note);

    let mut blocks = split_source_blocks(raw_note);
    if blocks.is_empty() {
        blocks = url_window_blocks(raw_note);
    }
    if blocks.is_empty() {
        if let Some(path) = &ctx.doc_path {
            // Document tools emit no URLs; the whole note is one block
            // attributed to the file.
            blocks.push(EvidenceBlock {
                title: None,
                url: Some(format!("file://{}", path)),
                summary: None,
                content: raw_note.trim().to_string(),
            });
        }
    }

    (blocks, ctx)
}

/// Build the immutable source record for one evidence block.
fn make_reference(block: &EvidenceBlock, ctx: &NoteContext) -> Option<SourceReference> {
    let url = block.url.clone()?;
    let source_type = if url.starts_with("file://") {
        SourceType::Document
    } else {
        ctx.source_type()
    };

    let excerpt = match &block.summary {
        Some(summary) => summary.clone(),
        None => truncate_chars(&block.content, MAX_FINDING_CHARS),
    };

    let title = block
        .title
        .clone()
        .or_else(|| {
            title_line_re()
                .captures(&block.content)
                .map(|c| c["title"].trim().to_string())
        })
        .unwrap_or_else(|| {
            truncate_chars(excerpt.lines().next().unwrap_or(&excerpt).trim(), 80)
        });

    Some(SourceReference {
        url,
        source_type,
        title,
        excerpt,
        raw_content: truncate_chars(&block.content, 1000),
        fetched_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Extract the source records referenced by one raw note.
pub fn extract_source_references(raw_note: &str) -> Vec<SourceReference> {
    let (blocks, ctx) = evidence_blocks(raw_note);
    blocks
        .iter()
        .filter_map(|block| make_reference(block, &ctx))
        .collect()
}

/// Extract zero or more insights from one raw note.
///
/// IDs are left empty; the supervisor assigns `insight-NNN` IDs when the
/// finding is integrated, keeping them monotonic across the whole run.
pub fn extract_insights(
    raw_note: &str,
    topic: &str,
    iteration: usize,
    researcher_number: usize,
) -> Vec<SubInsight> {
    let (blocks, ctx) = evidence_blocks(raw_note);

    blocks
        .into_iter()
        .filter_map(|block| {
            let reference = make_reference(&block, &ctx)?;
            build_insight(reference, &ctx, topic, iteration, researcher_number)
        })
        .collect()
}

fn build_insight(
    reference: SourceReference,
    ctx: &NoteContext,
    topic: &str,
    iteration: usize,
    researcher_number: usize,
) -> Option<SubInsight> {
    let finding = reference.excerpt.clone();

    let substance = finding.chars().filter(|c| !c.is_whitespace()).count();
    if substance < MIN_FINDING_CHARS {
        return None;
    }

    let mut analysis_chain = vec![format!("Research topic: {}", truncate_chars(topic, 100))];
    if let Some(tool) = ctx.tool {
        analysis_chain.push(format!("Tool used: {}", tool));
    }
    if let Some(path) = &ctx.doc_path {
        analysis_chain.push(format!("Document analyzed: {}", path));
    } else if let Some(query) = &ctx.query {
        analysis_chain.push(format!("Query executed: {}", query));
    }
    analysis_chain.push(format!("Source: {}", reference.url));
    analysis_chain.push("Finding extracted from source content".to_string());

    let confidence = score_confidence(&reference.url, &finding);

    Some(SubInsight {
        id: String::new(),
        topic: topic.to_string(),
        title: reference.title,
        finding,
        implication: None,
        source_url: reference.url,
        source_type: reference.source_type,
        raw_excerpt: reference.raw_content,
        analysis_chain,
        tool_used: ctx.tool.map(str::to_string),
        query_used: ctx.query.clone(),
        confidence,
        iteration,
        researcher_number,
        timestamp: reference.fetched_at,
    })
}
