//! Search Tool
//!
//! Pluggable web search with Tavily and DuckDuckGo providers. Output blocks
//! always carry `URL:` lines so insight extraction can attribute findings.
//! Optionally fetches and summarizes the top results inline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use drafthorse_tools::{names, ResearchTool};

use crate::config::SearchConfig;
use crate::tools::web_fetch::WebFetchService;

/// Maximum search requests per minute
const MAX_SEARCHES_PER_MIN: u32 = 20;

/// Characters of fetched text used for an inline summary
const SUMMARY_EXCERPT_CHARS: usize = 600;

/// A search result entry
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Trait for pluggable search providers
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for display
    fn name(&self) -> &str;

    /// Execute a search query
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, String>;
}

/// Tavily search provider (requires API key)
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "Tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, String> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": false,
        });

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Tavily request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Tavily API error ({}): {}",
                status.as_u16(),
                err_body
            ));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Tavily response: {}", e))?;

        let results = data
            .get("results")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|item| SearchResult {
                        title: string_field(item, "title"),
                        url: string_field(item, "url"),
                        snippet: string_field(item, "content"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

fn string_field(item: &serde_json::Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// DuckDuckGo search provider (no API key required, scrapes HTML results)
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, String> {
        let response = self
            .client
            .post("https://html.duckduckgo.com/html/")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("q={}", urlencoding::encode(query)))
            .send()
            .await
            .map_err(|e| format!("DuckDuckGo request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("DuckDuckGo error ({})", status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| format!("Failed to read DuckDuckGo response: {}", e))?;

        Ok(parse_duckduckgo_results(&html, max_results))
    }
}

/// Parse DuckDuckGo HTML results. Links live in `<a class="result__a">`,
/// snippets in `result__snippet` elements, and the real URL is wrapped in a
/// `uddg=` redirect parameter.
fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let mut pos = 0;

    while results.len() < max_results {
        let link_marker = "class=\"result__a\"";
        let link_start = match html[pos..].find(link_marker) {
            Some(i) => pos + i,
            None => break,
        };

        let href_start = match html[..link_start].rfind("href=\"") {
            Some(i) => i + 6,
            None => {
                pos = link_start + link_marker.len();
                continue;
            }
        };
        let href_end = match html[href_start..].find('"') {
            Some(i) => href_start + i,
            None => {
                pos = link_start + link_marker.len();
                continue;
            }
        };
        let raw_url = &html[href_start..href_end];

        let url = if raw_url.contains("uddg=") {
            raw_url
                .split("uddg=")
                .nth(1)
                .and_then(|u| u.split('&').next())
                .map(|u| urlencoding::decode(u).unwrap_or_default().to_string())
                .unwrap_or_else(|| raw_url.to_string())
        } else {
            raw_url.to_string()
        };

        let title_start = match html[link_start..].find('>') {
            Some(i) => link_start + i + 1,
            None => {
                pos = link_start + link_marker.len();
                continue;
            }
        };
        let title_end = match html[title_start..].find("</a>") {
            Some(i) => title_start + i,
            None => {
                pos = link_start + link_marker.len();
                continue;
            }
        };
        let title = strip_html_tags(&html[title_start..title_end]);

        pos = title_end;
        let snippet_marker = "class=\"result__snippet\"";
        let snippet = if let Some(snippet_pos) = html[pos..].find(snippet_marker) {
            let snippet_abs = pos + snippet_pos;
            if let Some(content_start) = html[snippet_abs..].find('>') {
                let s_start = snippet_abs + content_start + 1;
                html[s_start..]
                    .find("</a>")
                    .or_else(|| html[s_start..].find("</span>"))
                    .map(|s_end| strip_html_tags(&html[s_start..s_start + s_end]))
                    .unwrap_or_default()
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        if !url.is_empty() && !title.is_empty() {
            results.push(SearchResult {
                title,
                url,
                snippet,
            });
        }

        pos = title_end + 1;
    }

    results
}

/// Strip HTML tags and decode common HTML entities from a string.
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

/// The `search` tool: formats provider results into `URL:`-attributed blocks
/// and optionally fetches the top results for inline summaries.
pub struct WebSearchTool {
    provider: Box<dyn SearchProvider>,
    fetcher: Arc<WebFetchService>,
    config: SearchConfig,
    request_count: AtomicU32,
    window_start: Mutex<Instant>,
}

impl WebSearchTool {
    /// Create the tool with the named provider.
    ///
    /// - `"tavily"` requires an API key
    /// - `"duckduckgo"` (or empty) works without one
    pub fn new(
        provider_name: &str,
        api_key: Option<&str>,
        fetcher: Arc<WebFetchService>,
        config: SearchConfig,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) Drafthorse/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let provider: Box<dyn SearchProvider> = match provider_name.to_lowercase().as_str() {
            "tavily" => {
                let key = api_key
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| "Tavily requires an API key".to_string())?;
                Box::new(TavilyProvider {
                    client,
                    api_key: key.to_string(),
                })
            }
            "duckduckgo" | "" => Box::new(DuckDuckGoProvider { client }),
            other => {
                return Err(format!(
                    "Unknown search provider: '{}'. Supported: tavily, duckduckgo",
                    other
                ))
            }
        };

        Ok(Self::with_provider(provider, fetcher, config))
    }

    /// Create the tool over an already-built provider (used by tests).
    pub fn with_provider(
        provider: Box<dyn SearchProvider>,
        fetcher: Arc<WebFetchService>,
        config: SearchConfig,
    ) -> Self {
        Self {
            provider,
            fetcher,
            config,
            request_count: AtomicU32::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    fn check_rate_limit(&self) -> Result<(), String> {
        {
            let mut start = self
                .window_start
                .lock()
                .map_err(|_| "rate limiter poisoned".to_string())?;
            if start.elapsed() >= std::time::Duration::from_secs(60) {
                *start = Instant::now();
                self.request_count.store(0, Ordering::Relaxed);
            }
        }
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count >= MAX_SEARCHES_PER_MIN {
            return Err(format!(
                "Rate limited: too many search requests (max {} per minute)",
                MAX_SEARCHES_PER_MIN
            ));
        }
        Ok(())
    }

    /// Render results into the attributed block format, fetching summaries
    /// for the top results when enabled.
    async fn render_results(&self, query: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return format!("Search results for: \"{}\"\n\nNo results found.", query);
        }

        let summarize_count = if self.config.summarize_top_results {
            self.config.summarize_count.min(3)
        } else {
            0
        };

        let mut output = format!("Search results for: \"{}\"\n\n", query);

        for (i, result) in results.iter().enumerate() {
            if i < summarize_count {
                match self.fetcher.fetch(&result.url).await {
                    Ok(text) => {
                        let excerpt: String = text.chars().take(SUMMARY_EXCERPT_CHARS).collect();
                        output.push_str(&format!(
                            "--- SOURCE {}: {} ---\nURL: {}\nSUMMARY: {}\n\n",
                            i + 1,
                            result.title,
                            result.url,
                            excerpt.trim()
                        ));
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!(url = %result.url, "inline summary fetch failed: {}", e);
                        // Fall through to the snippet form.
                    }
                }
            }
            output.push_str(&format!(
                "{}. {}\nURL: {}\nSNIPPET: {}\n\n",
                i + 1,
                result.title,
                result.url,
                result.snippet
            ));
        }

        output.trim_end().to_string()
    }
}

#[async_trait]
impl ResearchTool for WebSearchTool {
    fn name(&self) -> &str {
        names::SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information. Arguments: {\"query\": \"...\", \"count\": 5}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        let cap = self.config.max_results_per_query.clamp(1, 10);
        let count = args
            .get("count")
            .and_then(|v| v.as_u64())
            .map(|c| c as usize)
            .unwrap_or(cap)
            .clamp(1, cap);

        self.check_rate_limit()?;

        let results = self.provider.search(query, count).await?;
        Ok(self.render_results(query, &results).await)
    }
}
