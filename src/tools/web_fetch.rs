//! Fetch Tool
//!
//! Fetches web pages and returns their text content, with caching and
//! private-address protection. HTML is converted to text and whitespace is
//! collapsed; everything else passes through as-is.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;
use serde_json::Value;

use drafthorse_tools::{names, ResearchTool};

/// Hard cap on returned text
const MAX_OUTPUT_CHARS: usize = 10_000;

/// Maximum download size (10MB)
const MAX_DOWNLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Request timeout in seconds
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Cache TTL (15 minutes)
const CACHE_TTL_SECS: u64 = 15 * 60;

/// Maximum cache entries
const MAX_CACHE_ENTRIES: u64 = 100;

/// Fetch service with persistent client and in-memory cache.
///
/// Shared between the `fetch` tool and the search adapter's inline
/// summarization path.
pub struct WebFetchService {
    client: reqwest::Client,
    cache: Cache<String, String>,
}

impl WebFetchService {
    /// Create a new fetch service
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) Drafthorse/0.1")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build();

        Self { client, cache }
    }

    /// Fetch a URL and return its extracted text, capped at
    /// [`MAX_OUTPUT_CHARS`] characters.
    pub async fn fetch(&self, url_str: &str) -> Result<String, String> {
        let url = self.validate_url(url_str)?;
        let url_string = url.to_string();

        if let Some(cached) = self.cache.get(&url_string) {
            return Ok(cached);
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| format!("Failed to fetch URL: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        if bytes.len() > MAX_DOWNLOAD_SIZE {
            return Err(format!(
                "Response too large: {:.1} MB (max {:.1} MB)",
                bytes.len() as f64 / (1024.0 * 1024.0),
                MAX_DOWNLOAD_SIZE as f64 / (1024.0 * 1024.0)
            ));
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        let text = if content_type.contains("text/html") || content_type.contains("xhtml") {
            html_to_text(&body)
        } else {
            body
        };

        let text = truncate_chars(&text, MAX_OUTPUT_CHARS);

        self.cache.insert(url_string, text.clone());
        Ok(text)
    }

    /// Validate a URL: parse, enforce HTTPS, block private addresses.
    fn validate_url(&self, url_str: &str) -> Result<url::Url, String> {
        // Auto-upgrade HTTP to HTTPS
        let url_str = if url_str.starts_with("http://") {
            url_str.replacen("http://", "https://", 1)
        } else if !url_str.starts_with("https://") {
            format!("https://{}", url_str)
        } else {
            url_str.to_string()
        };

        let url = url::Url::parse(&url_str).map_err(|e| format!("Invalid URL: {}", e))?;

        let host = url.host_str().ok_or_else(|| "URL has no host".to_string())?;
        if is_private_host(host) {
            return Err(format!(
                "Blocked: private/local address '{}' (SSRF prevention)",
                host
            ));
        }

        Ok(url)
    }
}

impl Default for WebFetchService {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert HTML to readable text: scripts and styles dropped, tags
/// flattened, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let text = htmd::convert(html).unwrap_or_else(|_| html.to_string());
    collapse_whitespace(&text)
}

/// Trim trailing spaces per line and collapse runs of blank lines.
fn collapse_whitespace(text: &str) -> String {
    let mut out = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out.trim().to_string()
}

/// Truncate at a character boundary with a marker.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}\n\n... (content truncated)", truncated)
}

/// Check if a hostname resolves to a private/local address.
fn is_private_host(host: &str) -> bool {
    let lower = host.to_lowercase();
    if lower == "localhost"
        || lower == "0.0.0.0"
        || lower == "::1"
        || lower.ends_with(".local")
        || lower.ends_with(".internal")
    {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(ipv4) => {
                ipv4.is_loopback()
                    || ipv4.is_private()
                    || ipv4.is_link_local()
                    || ipv4.is_unspecified()
                    || ipv4.is_broadcast()
            }
            IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified(),
        };
    }

    false
}

/// The `fetch` tool: URL in, plain text out, with a provenance header.
pub struct WebFetchTool {
    service: Arc<WebFetchService>,
}

impl WebFetchTool {
    /// Create the tool over a shared fetch service
    pub fn new(service: Arc<WebFetchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ResearchTool for WebFetchTool {
    fn name(&self) -> &str {
        names::FETCH
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its text content. Arguments: {\"url\": \"https://...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing 'url' argument".to_string())?;

        let text = self.service.fetch(url).await?;
        Ok(format!("Fetched from: {}\n\n{}", url, text))
    }
}
