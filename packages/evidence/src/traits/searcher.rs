//! Web searcher trait - the external search capability.
//!
//! The harvester only needs "query + result-count hint -> ranked raw hits".
//! Per-call failures are returned as errors and caught by the harvester,
//! which degrades them to an empty result set.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::{EvidenceError, Result};
use crate::security::SecretString;
use crate::testing::InFlightGauge;

/// A raw search hit, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub url: String,

    pub title: Option<String>,

    /// Snippet or extracted content from the provider
    pub content: Option<String>,

    /// Provider-reported publish date, in whatever format it uses
    pub published_date: Option<String>,

    /// Relevance score (0.0-1.0, if provided by search API)
    pub score: Option<f32>,
}

impl SearchResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_published_date(mut self, date: impl Into<String>) -> Self {
        self.published_date = Some(date.into());
        self
    }
}

/// Web search capability.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Search the web, asking the provider for about `limit` results.
    async fn search_with_limit(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

#[async_trait]
impl<T: WebSearcher + ?Sized> WebSearcher for std::sync::Arc<T> {
    async fn search_with_limit(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        (**self).search_with_limit(query, limit).await
    }
}

/// Mock web searcher for testing.
///
/// Unknown queries return no results; queries registered with
/// [`MockWebSearcher::with_failure`] return an error.
#[derive(Default)]
pub struct MockWebSearcher {
    results: RwLock<HashMap<String, Vec<SearchResult>>>,
    failures: RwLock<HashMap<String, String>>,
    calls: RwLock<Vec<String>>,
    latency: Option<Duration>,
    in_flight: InFlightGauge,
}

impl MockWebSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add results for a query.
    pub fn with_results(self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results
            .write()
            .unwrap()
            .insert(query.to_string(), results);
        self
    }

    /// Add bare URLs as results for a query.
    pub fn with_urls(self, query: &str, urls: &[&str]) -> Self {
        let results = urls.iter().map(|u| SearchResult::new(*u)).collect();
        self.with_results(query, results)
    }

    /// Make a query fail.
    pub fn with_failure(self, query: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(query.to_string(), message.to_string());
        self
    }

    /// Sleep this long before answering every query.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queries received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Most searches observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl WebSearcher for MockWebSearcher {
    async fn search_with_limit(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let _in_flight = self.in_flight.enter();
        self.calls.write().unwrap().push(query.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(message) = self.failures.read().unwrap().get(query) {
            return Err(EvidenceError::Search(message.clone().into()));
        }

        let mut results = self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }
}

/// Tavily-backed web searcher.
pub struct TavilyWebSearcher {
    api_key: SecretString,
    client: reqwest::Client,
    search_depth: String,
}

impl TavilyWebSearcher {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            search_depth: "basic".to_string(),
        }
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl WebSearcher for TavilyWebSearcher {
    async fn search_with_limit(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            query: &'a str,
            search_depth: &'a str,
            max_results: usize,
        }

        #[derive(serde::Deserialize)]
        struct Response {
            results: Vec<TavilyResult>,
        }

        #[derive(serde::Deserialize)]
        struct TavilyResult {
            url: String,
            title: Option<String>,
            content: Option<String>,
            published_date: Option<String>,
            score: Option<f32>,
        }

        let request = Request {
            query,
            search_depth: &self.search_depth,
            max_results: limit,
        };

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(|e| EvidenceError::Search(Box::new(e)))?;

        if !response.status().is_success() {
            return Err(EvidenceError::Search(
                format!("Tavily API error: {}", response.status()).into(),
            ));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| EvidenceError::Search(Box::new(e)))?;

        Ok(body
            .results
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                content: r.content,
                published_date: r.published_date,
                score: r.score,
            })
            .collect())
    }
}
