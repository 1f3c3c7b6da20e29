//! Content extraction - URL in, title and main text out.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{EvidenceError, Result};
use crate::types::page::ExtractedContent;

/// Fetch a page and reduce it to its main text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedContent>;
}

#[async_trait]
impl<T: ContentExtractor + ?Sized> ContentExtractor for std::sync::Arc<T> {
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        (**self).extract(url).await
    }
}

static RE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static RE_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static RE_NOSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap());
static RE_CHROME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(nav|footer|header)[^>]*>.*?</(nav|footer|header)>").unwrap());
static RE_BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(p|div|li|h[1-6]|tr|section|article)>|<br\s*/?>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static RE_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Reduce HTML to readable text, one block per line.
pub fn html_to_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, "");
    let text = RE_STYLE.replace_all(&text, "");
    let text = RE_NOSCRIPT.replace_all(&text, "");
    let text = RE_CHROME.replace_all(&text, "");
    let text = RE_BLOCK_END.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    let lines: Vec<String> = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    RE_BLANK_LINES
        .replace_all(lines.join("\n").trim(), "\n")
        .to_string()
}

/// Extract the `<title>` of an HTML document.
pub fn html_title(html: &str) -> Option<String> {
    RE_TITLE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty())
}

/// Plain HTTP extractor.
///
/// Good enough for server-rendered marketing, docs and pricing pages.
pub struct HttpExtractor {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpExtractor {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EvidenceError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            user_agent: "EvidenceBot/1.0".to_string(),
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        debug!(url = %url, "HTTP fetch starting");
        let failed = |reason: String| EvidenceError::Extraction {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                failed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let html = response.text().await.map_err(|e| failed(e.to_string()))?;
        let main_text = html_to_text(&html);
        if main_text.is_empty() {
            return Err(failed("no text content".to_string()));
        }

        Ok(ExtractedContent {
            title: html_title(&html),
            main_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_noise() {
        let html = r#"<html><head><title>Acme &amp; Co Pricing</title>
            <style>body { color: red }</style><script>track()</script></head>
            <body><nav>Home | Docs</nav><h1>Pricing</h1><p>Pro plan&nbsp;$49/mo</p>
            <ul><li>SSO</li><li>Audit log</li></ul></body></html>"#;

        let text = html_to_text(html);
        assert!(text.contains("Pricing"));
        assert!(text.contains("Pro plan $49/mo"));
        assert!(text.contains("Audit log"));
        assert!(!text.contains("track()"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Home | Docs"));

        assert_eq!(html_title(html).as_deref(), Some("Acme & Co Pricing"));
    }

    #[test]
    fn test_html_title_missing() {
        assert_eq!(html_title("<p>no title</p>"), None);
    }
}
