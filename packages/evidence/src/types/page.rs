//! Page types - cache entries and fetched pages.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::summary::PageSummary;

/// Default logical freshness window for cache entries.
pub const DEFAULT_STALENESS_WINDOW_DAYS: u32 = 7;

/// What a content extractor returns for a URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub main_text: String,
}

impl ExtractedContent {
    pub fn new(main_text: impl Into<String>) -> Self {
        Self {
            title: None,
            main_text: main_text.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A cached, extracted page keyed by normalized URL.
///
/// Entries are upserted on fetch and never deleted here; staleness is a
/// read-time check only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical URL (the cache key)
    pub normalized_url: String,

    /// SHA-256 hash of `raw_text`
    pub content_hash: String,

    pub raw_text: String,

    pub extracted: ExtractedContent,

    /// Pass A triage summary for this exact content, if computed
    pub summary: Option<PageSummary>,

    /// Triage schema version the summary was produced under
    pub summary_version: Option<String>,

    pub staleness_window_days: u32,

    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry from freshly extracted content.
    pub fn new(
        normalized_url: impl Into<String>,
        extracted: ExtractedContent,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let raw_text = extracted.main_text.clone();
        Self {
            normalized_url: normalized_url.into(),
            content_hash: hash_content(&raw_text),
            raw_text,
            extracted,
            summary: None,
            summary_version: None,
            staleness_window_days: DEFAULT_STALENESS_WINDOW_DAYS,
            fetched_at,
        }
    }

    /// Set the staleness window.
    pub fn with_staleness_window(mut self, days: u32) -> Self {
        self.staleness_window_days = days;
        self
    }

    /// Attach a triage summary.
    pub fn with_summary(mut self, summary: PageSummary, version: impl Into<String>) -> Self {
        self.summary = Some(summary);
        self.summary_version = Some(version.into());
        self
    }

    /// Logically stale once `now >= fetched_at + window`. A window that
    /// overflows the calendar never goes stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        Duration::try_days(i64::from(self.staleness_window_days))
            .and_then(|window| self.fetched_at.checked_add_signed(window))
            .is_some_and(|expires| now >= expires)
    }

    /// The cached summary, if it matches this content and schema version.
    pub fn summary_for(&self, content_hash: &str, version: &str) -> Option<&PageSummary> {
        if self.content_hash != content_hash {
            return None;
        }
        match (&self.summary, &self.summary_version) {
            (Some(summary), Some(v)) if v == version => Some(summary),
            _ => None,
        }
    }
}

/// A successfully fetched page as handed to triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL as requested
    pub url: String,
    pub normalized_url: String,
    pub title: Option<String>,
    pub text: String,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    /// Served from the cache without refetching
    pub from_cache: bool,
}

impl FetchedPage {
    pub fn from_entry(url: impl Into<String>, entry: &CacheEntry, from_cache: bool) -> Self {
        Self {
            url: url.into(),
            normalized_url: entry.normalized_url.clone(),
            title: entry.extracted.title.clone(),
            text: entry.raw_text.clone(),
            content_hash: entry.content_hash.clone(),
            fetched_at: entry.fetched_at,
            from_cache,
        }
    }
}

/// Calculate SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::summary::{CredibilityHint, RecencyHint};
    use crate::EvidenceCategory;

    fn summary() -> PageSummary {
        PageSummary {
            category: EvidenceCategory::Pricing,
            signals: vec!["Pro plan $49/mo".into()],
            coverage_score: 0.8,
            recency_hint: RecencyHint::Last90Days,
            credibility_hint: CredibilityHint::Official,
            recommended_for_deep_read: true,
        }
    }

    #[test]
    fn test_content_hash() {
        let entry = CacheEntry::new(
            "https://example.com/pricing",
            ExtractedContent::new("Hello, world!"),
            Utc::now(),
        );
        assert_eq!(entry.content_hash.len(), 64);
        assert_eq!(entry.content_hash, hash_content("Hello, world!"));
    }

    #[test]
    fn test_is_stale_boundary() {
        let fetched = Utc::now();
        let entry = CacheEntry::new("https://example.com", ExtractedContent::new("x"), fetched);

        assert!(!entry.is_stale(fetched + Duration::days(6)));
        assert!(entry.is_stale(fetched + Duration::days(7)));

        let short = entry.with_staleness_window(1);
        assert!(short.is_stale(fetched + Duration::days(1)));
    }

    #[test]
    fn test_huge_window_never_stale() {
        let fetched = Utc::now();
        let entry = CacheEntry::new("https://example.com", ExtractedContent::new("x"), fetched)
            .with_staleness_window(u32::MAX);

        assert!(!entry.is_stale(fetched));
        assert!(!entry.is_stale(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_summary_for_checks_hash_and_version() {
        let entry = CacheEntry::new("https://example.com", ExtractedContent::new("x"), Utc::now())
            .with_summary(summary(), "v1");
        let hash = entry.content_hash.clone();

        assert!(entry.summary_for(&hash, "v1").is_some());
        assert!(entry.summary_for(&hash, "v2").is_none());
        assert!(entry.summary_for("other", "v1").is_none());
    }
}
