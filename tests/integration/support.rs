//! Shared test doubles for the integration suite.
//!
//! `KeyedProvider` routes each chat call to a scripted response queue by
//! matching on the system prompt (and optionally any message content), so
//! scripts stay deterministic even when parallel sub-researchers share the
//! provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use drafthorse::error::{EngineError, EngineResult};
use drafthorse::researcher::{ResearchFinding, Researcher};
use drafthorse_llm::{
    ChatChoice, ChatResponse, LlmError, LlmProvider, LlmResult, Message, UsageStats,
};
use drafthorse_tools::ResearchTool;

struct Rule {
    system_key: String,
    any_key: Option<String>,
    responses: Mutex<VecDeque<String>>,
}

/// Scripted provider with content-keyed response routing.
pub struct KeyedProvider {
    rules: Vec<Rule>,
    transcripts: Mutex<Vec<Vec<Message>>>,
}

impl KeyedProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Add a response queue for calls whose system prompt contains
    /// `system_key` and, when given, any message contains `any_key`.
    pub fn rule(mut self, system_key: &str, any_key: Option<&str>, responses: Vec<&str>) -> Self {
        self.rules.push(Rule {
            system_key: system_key.to_string(),
            any_key: any_key.map(String::from),
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        });
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Transcripts of every call whose system prompt contained `key`.
    pub fn calls_with_system(&self, key: &str) -> Vec<Vec<Message>> {
        self.transcripts
            .lock()
            .unwrap()
            .iter()
            .filter(|messages| {
                messages
                    .first()
                    .is_some_and(|m| m.content.contains(key))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmProvider for KeyedProvider {
    fn name(&self) -> &'static str {
        "keyed"
    }

    fn model(&self) -> &str {
        "keyed-model"
    }

    async fn chat(&self, messages: Vec<Message>) -> LlmResult<ChatResponse> {
        self.transcripts.lock().unwrap().push(messages.clone());

        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        for rule in &self.rules {
            if !system.contains(&rule.system_key) {
                continue;
            }
            if let Some(any_key) = &rule.any_key {
                if !messages.iter().any(|m| m.content.contains(any_key)) {
                    continue;
                }
            }
            let mut responses = rule.responses.lock().unwrap();
            if let Some(content) = responses.pop_front() {
                return Ok(ChatResponse {
                    choices: vec![ChatChoice {
                        message: Message::assistant(content),
                    }],
                    usage: UsageStats {
                        prompt_tokens: 10,
                        completion_tokens: 10,
                    },
                });
            }
        }

        Err(LlmError::Other {
            message: format!(
                "no scripted response for call (system head: {:.60})",
                system.replace('\n', " ")
            ),
        })
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
}

/// Search tool that returns canned results keyed by query substring.
pub struct MockSearchTool {
    canned: Vec<(String, String)>,
}

impl MockSearchTool {
    pub fn new(canned: Vec<(&str, &str)>) -> Self {
        Self {
            canned: canned
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ResearchTool for MockSearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "mock web search"
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        for (key, response) in &self.canned {
            if query.contains(key.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(format!(
            "Search results for: \"{}\"\n\nNo results found.",
            query
        ))
    }
}

/// Spreadsheet tool double emitting the reader's output shape.
pub struct MockXlsxTool;

#[async_trait]
impl ResearchTool for MockXlsxTool {
    fn name(&self) -> &str {
        "read_xlsx"
    }

    fn description(&self) -> &str {
        "mock spreadsheet preview"
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'path' argument".to_string())?;
        Ok(format!(
            "Read document: {path}\nWorkbook: revenue.xlsx\nSheets: summary\n\n## Sheet: summary\nregion | revenue\nEMEA | 1200000\nAPAC | 900000\n"
        ))
    }
}

/// Researcher double that sleeps, then returns a canned finding whose note
/// cites one URL (or the URLs passed in).
pub struct StubResearcher {
    /// (topic substring, sleep, urls for the note)
    plans: Vec<(String, Duration, Vec<String>)>,
}

impl StubResearcher {
    pub fn new(plans: Vec<(&str, u64, Vec<&str>)>) -> Self {
        Self {
            plans: plans
                .into_iter()
                .map(|(topic, millis, urls)| {
                    (
                        topic.to_string(),
                        Duration::from_millis(millis),
                        urls.into_iter().map(String::from).collect(),
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Researcher for StubResearcher {
    async fn research(
        &self,
        topic: &str,
        researcher_number: usize,
        _iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<ResearchFinding> {
        let plan = self.plans.iter().find(|(key, _, _)| topic.contains(key));
        let (sleep, urls) = match plan {
            Some((_, sleep, urls)) => (*sleep, urls.clone()),
            None => (Duration::from_millis(1), vec![]),
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(sleep) => {}
        }

        let url_lines: String = urls
            .iter()
            .map(|u| format!("URL: {}\n", u))
            .collect();

        Ok(ResearchFinding {
            topic: topic.to_string(),
            researcher_number,
            compressed: format!("{} findings [1].\n\nSources:\n{}", topic, url_lines),
            raw_notes: vec![format!(
                "Search results for: \"{}\"\n\n{}",
                topic, url_lines
            )],
            visited_urls: urls,
            sources: vec![],
            insights: vec![],
            usage: UsageStats::default(),
        })
    }
}

/// Researcher double that blocks until cancelled.
pub struct BlockingResearcher;

#[async_trait]
impl Researcher for BlockingResearcher {
    async fn research(
        &self,
        _topic: &str,
        _researcher_number: usize,
        _iteration: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<ResearchFinding> {
        cancel.cancelled().await;
        Err(EngineError::Cancelled)
    }
}
