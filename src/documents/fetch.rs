//! Job listing pages fetched from links the user sends

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use regex::Regex;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; jobpilot)";
const MAX_REDIRECTS: usize = 10;

/// Fetches a listing page and reduces it to plain text
pub struct ListingFetcher {
    client: reqwest::Client,
    max_chars: usize,
    hidden_blocks: Regex,
    tags: Regex,
    whitespace: Regex,
    link: Regex,
}

impl ListingFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build client: {}", e)))?;

        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Internal(format!("invalid pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            client,
            max_chars: config.max_chars,
            hidden_blocks: compile(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)\s*>")?,
            tags: compile(r"(?s)<[^>]+>")?,
            whitespace: compile(r"\s+")?,
            link: compile(r"https?://\S+")?,
        })
    }

    /// First http(s) link in a message, without trailing punctuation
    pub fn extract_url(&self, text: &str) -> Option<String> {
        let found = self.link.find(text)?.as_str();
        let url = found.trim_end_matches(|c: char| ".,;:!?)]>\"'".contains(c));
        if url.len() <= "https://".len() {
            return None;
        }
        Some(url.to_string())
    }

    /// Download a page and return its visible text
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("{} returned {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let text = self.strip_markup(&html);

        tracing::debug!(url = %url, chars = text.chars().count(), "Fetched listing");

        if text.is_empty() {
            return Err(Error::Fetch(format!("{} contains no text", url)));
        }
        Ok(text)
    }

    /// Drop scripts, styles and tags, decode common entities, collapse
    /// whitespace and bound the result
    pub fn strip_markup(&self, html: &str) -> String {
        let text = self.hidden_blocks.replace_all(html, " ");
        let text = self.tags.replace_all(&text, " ");
        let text = decode_entities(&text);
        let text = self.whitespace.replace_all(&text, " ");
        text.trim().chars().take(self.max_chars).collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
