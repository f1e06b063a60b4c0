//! Supervisor batch behavior: iteration caps, fan-out ordering, and
//! cancellation mid-batch.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use drafthorse::config::EngineConfig;
use drafthorse::error::EngineError;
use drafthorse::events::ChannelSink;
use drafthorse::Supervisor;
use drafthorse_core::ResearchEvent;

use crate::support::{BlockingResearcher, KeyedProvider, StubResearcher};

const COMPLETE: &str = "```tool_call\n{\"tool\": \"research_complete\", \"arguments\": {}}\n```";

fn research_call(topic: &str) -> String {
    format!(
        "```tool_call\n{{\"tool\": \"conduct_research\", \"arguments\": {{\"topic\": \"{}\"}}}}\n```",
        topic
    )
}

fn drain_events(rx: &mut tokio::sync::mpsc::Receiver<ResearchEvent>) -> Vec<ResearchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn iteration_cap_stops_the_loop() {
    let one_research = research_call("the same gap");
    let provider = KeyedProvider::new()
        .rule("You write research briefs", None, vec!["Brief."])
        .rule("prior knowledge", None, vec!["# Draft"])
        .rule(
            "research supervisor",
            None,
            vec![
                one_research.as_str(),
                one_research.as_str(),
                one_research.as_str(),
            ],
        )
        .rule("final research reports", None, vec!["Final."])
        .into_arc();

    let researcher = StubResearcher::new(vec![(
        "the same gap",
        1,
        vec!["https://example.org/gap"],
    )]);

    let (sink, mut rx) = ChannelSink::bounded(256);
    let supervisor = Supervisor::new(
        provider,
        Arc::new(researcher),
        Arc::new(sink),
        EngineConfig {
            max_iterations: 3,
            ..EngineConfig::default()
        },
    );

    let record = supervisor
        .coordinate("q", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.notes.len(), 3);
    assert_eq!(record.final_report, "Final.");

    let events = drain_events(&mut rx);
    let iterations = events
        .iter()
        .filter(|e| matches!(e, ResearchEvent::IterationStarted { .. }))
        .count();
    assert_eq!(iterations, 3);

    // Iteration numbers are consecutive from 1.
    let numbers: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ResearchEvent::IterationStarted { iteration } => Some(*iteration),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn fanout_integrates_in_call_order() {
    // Three topics in order; the middle researcher is the slowest.
    let fanout = format!(
        "{}\n{}\n{}",
        research_call("alpha"),
        research_call("bravo"),
        research_call("charlie")
    );
    let provider = KeyedProvider::new()
        .rule("You write research briefs", None, vec!["Brief."])
        .rule("prior knowledge", None, vec!["# Draft"])
        .rule("research supervisor", None, vec![fanout.as_str(), COMPLETE])
        .rule("final research reports", None, vec!["Final."])
        .into_arc();

    let researcher = StubResearcher::new(vec![
        ("alpha", 10, vec!["https://example.org/a"]),
        ("bravo", 150, vec!["https://example.org/b"]),
        ("charlie", 50, vec!["https://example.org/c"]),
    ]);

    let (sink, mut rx) = ChannelSink::bounded(256);
    let supervisor = Supervisor::new(
        provider,
        Arc::new(researcher),
        Arc::new(sink),
        EngineConfig::default(),
    );

    let record = supervisor
        .coordinate("q", CancellationToken::new())
        .await
        .unwrap();

    // Notes are appended in conduct_research appearance order, not
    // completion order.
    let topics: Vec<&str> = record.notes.iter().map(|n| n.topic.as_str()).collect();
    assert_eq!(topics, vec!["alpha", "bravo", "charlie"]);

    let numbers: Vec<usize> = record
        .notes
        .iter()
        .map(|n| n.researcher_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    // Researcher numbers were assigned before spawning, in appearance order.
    let delegated: Vec<(String, usize)> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ResearchEvent::ResearchDelegated {
                topic,
                researcher_number,
                ..
            } => Some((topic, researcher_number)),
            _ => None,
        })
        .collect();
    assert_eq!(
        delegated,
        vec![
            ("alpha".to_string(), 1),
            ("bravo".to_string(), 2),
            ("charlie".to_string(), 3),
        ]
    );
}

#[tokio::test]
async fn cancellation_mid_batch_fails_closed() {
    let fanout = format!(
        "{}\n{}\n{}",
        research_call("alpha"),
        research_call("bravo"),
        research_call("charlie")
    );
    let provider = KeyedProvider::new()
        .rule("You write research briefs", None, vec!["Brief."])
        .rule("prior knowledge", None, vec!["# Draft"])
        .rule("research supervisor", None, vec![fanout.as_str()])
        .into_arc();

    let (sink, mut rx) = ChannelSink::bounded(256);
    let supervisor = Supervisor::new(
        provider,
        Arc::new(BlockingResearcher),
        Arc::new(sink),
        EngineConfig::default(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = supervisor.coordinate("q", cancel).await;
    assert!(matches!(result, Err(EngineError::Cancelled)));

    // The failure is reported through the event port; no final report
    // events were emitted.
    let events = drain_events(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ResearchEvent::RunFailed { phase, .. } if phase == "cancelled"
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ResearchEvent::FinalReportStarted)));
}

#[tokio::test]
async fn cancellation_before_first_call_yields_no_artifacts() {
    let provider = KeyedProvider::new().into_arc();
    let (sink, mut rx) = ChannelSink::bounded(16);
    let supervisor = Supervisor::new(
        provider.clone(),
        Arc::new(BlockingResearcher),
        Arc::new(sink),
        EngineConfig::default(),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = supervisor.coordinate("q", cancel).await;
    assert!(matches!(result, Err(EngineError::Cancelled)));

    // No model call was ever made.
    assert!(provider.calls_with_system("").is_empty());
    let events = drain_events(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ResearchEvent::IterationStarted { .. })));
}
