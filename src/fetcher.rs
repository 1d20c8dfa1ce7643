//! Web page text retrieval for expansion context.
//!
//! Fetches a resource URL and reduces the HTML to plain text: script
//! and style blocks are dropped, tags removed, whitespace collapsed,
//! and the result capped so it stays a reasonable prompt section.

use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-URL fetch timeout. Resource fetching is expected to be flaky,
/// so this stays short and failures degrade to placeholder text.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap applied to extracted page text.
const PAGE_TEXT_CAP: usize = 1500;

/// Some sites refuse requests without a browser user-agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/110.0.0.0 Safari/537.36";

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid regex")
});
// Anchored to a tag-opening character so a bare "<" in prose
// (comparisons, arrows) is left alone.
static TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[a-zA-Z/!][^>]*>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetches plain text for a URL.
///
/// Never fails: any error comes back as a short bracketed diagnostic
/// string embedding the URL, so callers can concatenate results
/// unconditionally.
#[async_trait]
pub(crate) trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> String;
}

pub(crate) struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub(crate) fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client for PageFetcher")?;
        Ok(Self { client })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(extract_text(&body))
    }
}

#[async_trait]
impl ContentFetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> String {
        match self.fetch_text(url).await {
            Ok(text) => {
                debug!(url, chars = text.len(), "Fetched resource content");
                text
            }
            Err(e) => {
                warn!(url, error = %e, "Resource fetch failed");
                format!("[Could not fetch {url}: {e}]")
            }
        }
    }
}

/// Reduce an HTML document to capped plain text.
pub(crate) fn extract_text(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE.replace_all(html, " ");
    let without_tags = TAGS.replace_all(&without_scripts, " ");
    let decoded = decode_basic_entities(&without_tags);
    let collapsed = WHITESPACE.replace_all(&decoded, " ");
    let text = collapsed.trim();

    if text.chars().count() <= PAGE_TEXT_CAP {
        text.to_string()
    } else {
        text.chars().take(PAGE_TEXT_CAP).collect()
    }
}

/// Decode the handful of entities common enough to matter in prose.
fn decode_basic_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
