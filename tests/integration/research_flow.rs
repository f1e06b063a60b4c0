//! End-to-end research flows over real sub-researchers: the happy path,
//! URL deduplication before synthesis, and document-backed findings.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use drafthorse::config::{EngineConfig, ResearcherConfig};
use drafthorse::dedup_notes;
use drafthorse::events::ChannelSink;
use drafthorse::tools::ThinkTool;
use drafthorse::{SubResearcher, Supervisor};
use drafthorse_core::{ResearchEvent, SourceType};
use drafthorse_llm::LlmProvider;
use drafthorse_tools::ToolRegistry;

use crate::support::{KeyedProvider, MockSearchTool, MockXlsxTool, StubResearcher};

const COMPLETE: &str = "```tool_call\n{\"tool\": \"research_complete\", \"arguments\": {}}\n```";

const INITIAL_DRAFT: &str = "# HTTP/3\n\n## Overview\n[NEEDS RESEARCH]\n\n## Transport\n[NEEDS RESEARCH]\n\n## Deployment\n[NEEDS RESEARCH]\n\n## Performance\n[NEEDS RESEARCH]\n\n## Outlook\n[NEEDS RESEARCH]\n";

fn search_call(query: &str) -> String {
    format!(
        "```tool_call\n{{\"tool\": \"search\", \"arguments\": {{\"query\": \"{}\"}}}}\n```",
        query
    )
}

/// Parse the `### Sources` list of a report into (number, url) pairs.
fn parse_sources(report: &str) -> Vec<(usize, String)> {
    let Some(section_start) = report.find("### Sources") else {
        return Vec::new();
    };
    report[section_start..]
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix('[')?;
            let close = rest.find(']')?;
            let number: usize = rest[..close].parse().ok()?;
            let url = rest[close + 1..].trim().to_string();
            (!url.is_empty()).then_some((number, url))
        })
        .collect()
}

#[tokio::test]
async fn happy_path_one_round_of_research() {
    let iter1 = r#"```tool_call
{"tool": "conduct_research", "arguments": {"topic": "QUIC transport overview"}}
```
```tool_call
{"tool": "conduct_research", "arguments": {"topic": "HTTP/3 deployment in major browsers"}}
```
```tool_call
{"tool": "refine_draft", "arguments": {}}
```"#;

    let quic_search_call = search_call("QUIC transport overview");
    let deploy_search_call = search_call("HTTP/3 deployment in major browsers");

    let final_report = "# HTTP/3\n\nHTTP/3 maps HTTP semantics onto QUIC, a multiplexed UDP transport [1] whose streams avoid head-of-line blocking [2]. It is enabled by default in Chrome [3] and Firefox [4].\n\n### Sources\n[1] https://example.org/quic-rfc\n[2] https://example.org/quic-design\n[3] https://example.org/h3-chrome\n[4] https://example.org/h3-firefox";

    let provider = KeyedProvider::new()
        .rule(
            "You write research briefs",
            None,
            vec!["Explain HTTP/3, its QUIC basis, and adoption status."],
        )
        .rule("prior knowledge", None, vec![INITIAL_DRAFT])
        .rule("research supervisor", None, vec![iter1, COMPLETE])
        .rule(
            "research assistant investigating",
            Some("QUIC transport overview"),
            vec![quic_search_call.as_str(), "QUIC gathered; answering now."],
        )
        .rule(
            "research assistant investigating",
            Some("HTTP/3 deployment in major browsers"),
            vec![
                deploy_search_call.as_str(),
                "Deployment gathered; answering now.",
            ],
        )
        .rule(
            "compressing a research conversation",
            Some("QUIC transport overview"),
            vec!["QUIC is a multiplexed transport over UDP standardized in RFC 9000 [1]. Streams are independent, avoiding TCP head-of-line blocking [2].\n\nSources:\nURL: https://example.org/quic-rfc\nURL: https://example.org/quic-design"],
        )
        .rule(
            "compressing a research conversation",
            Some("HTTP/3 deployment in major browsers"),
            vec!["Chrome enables HTTP/3 by default [1]; Firefox enabled it in release 88 [2].\n\nSources:\nURL: https://example.org/h3-chrome\nURL: https://example.org/h3-firefox"],
        )
        .rule("final research reports", None, vec![final_report])
        .into_arc();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(MockSearchTool::new(vec![
        (
            "QUIC transport",
            "Search results for: \"QUIC transport overview\"\n\n1. QUIC RFC overview\nURL: https://example.org/quic-rfc\nSNIPPET: QUIC is a multiplexed transport over UDP standardized in RFC 9000 with TLS 1.3 integrated.\n\n2. QUIC design notes\nURL: https://example.org/quic-design\nSNIPPET: QUIC streams are independent at the transport layer, avoiding TCP head-of-line blocking.\n",
        ),
        (
            "deployment",
            "Search results for: \"HTTP/3 deployment in major browsers\"\n\n1. Chrome ships HTTP/3\nURL: https://example.org/h3-chrome\nSNIPPET: Chrome enables HTTP/3 by default for all users on supported platforms.\n\n2. Firefox HTTP/3 rollout\nURL: https://example.org/h3-firefox\nSNIPPET: Firefox enabled HTTP/3 by default starting with release 88.\n",
        ),
    ])));
    registry.register(Arc::new(ThinkTool));

    let provider_dyn: Arc<dyn LlmProvider> = provider.clone();
    let (sink, mut rx) = ChannelSink::bounded(256);
    let events = Arc::new(sink);

    let researcher = SubResearcher::new(
        provider_dyn.clone(),
        Arc::new(registry),
        ResearcherConfig::default(),
        events.clone(),
    );
    let supervisor = Supervisor::new(
        provider_dyn,
        Arc::new(researcher),
        events,
        EngineConfig::default(),
    );

    let record = supervisor
        .coordinate("What is HTTP/3?", CancellationToken::new())
        .await
        .unwrap();

    // Two notes, integrated in conduct_research order with numbers 1 and 2.
    assert_eq!(record.notes.len(), 2);
    assert_eq!(record.notes[0].topic, "QUIC transport overview");
    assert_eq!(record.notes[0].researcher_number, 1);
    assert_eq!(record.notes[1].topic, "HTTP/3 deployment in major browsers");
    assert_eq!(record.notes[1].researcher_number, 2);

    // refine_draft ran before any notes existed: advisory no-op, so the
    // draft is still the prior-only initial draft.
    assert_eq!(record.draft_report, INITIAL_DRAFT);

    // Exactly two diffusion iterations ran.
    let mut iterations = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ResearchEvent::IterationStarted { .. }) {
            iterations += 1;
        }
    }
    assert_eq!(iterations, 2);

    // Citation numbering: sequential 1..N with N unique URLs.
    let sources = parse_sources(&record.final_report);
    let numbers: Vec<usize> = sources.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    let unique_urls: HashSet<&str> = sources.iter().map(|(_, u)| u.as_str()).collect();
    assert_eq!(unique_urls.len(), 4);

    // N matches the unique URLs across the deduplicated notes.
    let kept = dedup_notes(&record.notes);
    let note_urls: HashSet<&str> = kept
        .iter()
        .flat_map(|n| n.urls.iter().map(String::as_str))
        .collect();
    assert_eq!(note_urls.len(), 4);
    assert_eq!(note_urls, unique_urls);

    // Insight invariants: IDs strictly increasing, URLs within the visited
    // set.
    assert!(!record.sub_insights.is_empty());
    let ids: Vec<&str> = record.sub_insights.iter().map(|i| i.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
    for insight in &record.sub_insights {
        assert!(
            note_urls.contains(insight.source_url.as_str()),
            "insight URL {} not in visited set",
            insight.source_url
        );
    }
}

#[tokio::test]
async fn duplicate_urls_are_deduplicated_before_synthesis() {
    let fanout = "```tool_call\n{\"tool\": \"conduct_research\", \"arguments\": {\"topic\": \"alpha\"}}\n```\n```tool_call\n{\"tool\": \"conduct_research\", \"arguments\": {\"topic\": \"beta\"}}\n```";

    let provider = KeyedProvider::new()
        .rule("You write research briefs", None, vec!["Brief."])
        .rule("prior knowledge", None, vec!["# Draft"])
        .rule("research supervisor", None, vec![fanout, COMPLETE])
        .rule(
            "final research reports",
            None,
            vec!["Final [1].\n\n### Sources\n[1] https://example.org/x"],
        )
        .into_arc();

    // Both researchers cite the same single URL.
    let researcher = StubResearcher::new(vec![
        ("alpha", 1, vec!["https://example.org/x"]),
        ("beta", 1, vec!["https://example.org/x"]),
    ]);

    let provider_dyn: Arc<dyn LlmProvider> = provider.clone();
    let supervisor = Supervisor::new(
        provider_dyn,
        Arc::new(researcher),
        Arc::new(drafthorse_core::NullSink),
        EngineConfig::default(),
    );

    let record = supervisor
        .coordinate("q", CancellationToken::new())
        .await
        .unwrap();

    // Both notes are recorded, but only the first survives dedup.
    assert_eq!(record.notes.len(), 2);
    let kept = dedup_notes(&record.notes);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].topic, "alpha");

    // The synthesis prompt saw only the kept note.
    let final_calls = provider.calls_with_system("final research reports");
    assert_eq!(final_calls.len(), 1);
    let request = &final_calls[0][1].content;
    assert!(request.contains("alpha findings"));
    assert!(!request.contains("beta findings"));

    // And the final citation list has a single entry for the URL.
    let sources = parse_sources(&record.final_report);
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].1, "https://example.org/x");
}

#[tokio::test]
async fn document_topic_produces_file_attributed_insight() {
    let topic = "Summarize Q3 revenue from /data/q3/revenue.xlsx using read_xlsx";
    let fanout = format!(
        "```tool_call\n{{\"tool\": \"conduct_research\", \"arguments\": {{\"topic\": \"{}\"}}}}\n```",
        topic
    );
    let xlsx_call = "```tool_call\n{\"tool\": \"read_xlsx\", \"arguments\": {\"path\": \"/data/q3/revenue.xlsx\"}}\n```";

    let provider = KeyedProvider::new()
        .rule("You write research briefs", None, vec!["Brief."])
        .rule("prior knowledge", None, vec!["# Draft"])
        .rule("research supervisor", None, vec![fanout.as_str(), COMPLETE])
        .rule(
            "research assistant investigating",
            Some("revenue.xlsx"),
            vec![xlsx_call, "The workbook shows EMEA ahead of APAC."],
        )
        .rule(
            "compressing a research conversation",
            Some("revenue.xlsx"),
            vec!["Q3 revenue was 1,200,000 for EMEA and 900,000 for APAC [1].\n\nSources:\n[1] /data/q3/revenue.xlsx"],
        )
        .rule("final research reports", None, vec!["Final."])
        .into_arc();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(MockXlsxTool));
    registry.register(Arc::new(ThinkTool));

    let provider_dyn: Arc<dyn LlmProvider> = provider.clone();
    let researcher = SubResearcher::new(
        provider_dyn.clone(),
        Arc::new(registry),
        ResearcherConfig::default(),
        Arc::new(drafthorse_core::NullSink),
    );
    let supervisor = Supervisor::new(
        provider_dyn,
        Arc::new(researcher),
        Arc::new(drafthorse_core::NullSink),
        EngineConfig::default(),
    );

    let record = supervisor
        .coordinate("How did Q3 revenue break down?", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.sub_insights.len(), 1);
    let insight = &record.sub_insights[0];
    assert_eq!(insight.source_type, SourceType::Document);
    assert_eq!(insight.source_url, "file:///data/q3/revenue.xlsx");
    assert_eq!(insight.tool_used.as_deref(), Some("read_xlsx"));
    assert!(insight
        .analysis_chain
        .iter()
        .any(|step| step == "Document analyzed: /data/q3/revenue.xlsx"));

    // The note carries no web URLs, and still survives dedup.
    assert_eq!(record.notes.len(), 1);
    assert!(record.notes[0].urls.is_empty());
    assert_eq!(dedup_notes(&record.notes).len(), 1);
}
