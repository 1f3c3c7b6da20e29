//! Parallel fetcher - bounded-concurrency fetch+extract with a per-task
//! timeout, a batch budget and the page cache in front.
//!
//! Every input URL yields exactly one [`FetchRecord`], in input order.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::FetchFailure;
use crate::pipeline::normalize::canonicalize_url;
use crate::traits::{extractor::ContentExtractor, store::EvidenceCache};
use crate::types::{
    config::FetchConfig,
    page::{CacheEntry, FetchedPage},
};

/// Outcome for one input URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchRecord {
    /// URL as given
    pub url: String,
    /// Canonical URL, when the input could be parsed
    pub normalized_url: Option<String>,
    #[serde(serialize_with = "outcome_serde::serialize")]
    pub outcome: Result<FetchedPage, FetchFailure>,
}

impl FetchRecord {
    pub fn page(&self) -> Option<&FetchedPage> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        self.outcome.as_ref().err()
    }
}

mod outcome_serde {
    use super::*;
    use serde::Serializer;

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Outcome<'a> {
        Page(&'a FetchedPage),
        Failure(String),
    }

    pub fn serialize<S: Serializer>(
        outcome: &Result<FetchedPage, FetchFailure>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match outcome {
            Ok(page) => Outcome::Page(page).serialize(serializer),
            Err(failure) => Outcome::Failure(failure.to_string()).serialize(serializer),
        }
    }
}

/// Aggregate batch accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Fresh cache entries served without refetching
    pub cache_hits: usize,
    /// Attempted URLs not served from the cache
    pub cache_misses: usize,
    pub succeeded: usize,
    /// All failures, timeouts and budget exhaustion included
    pub failed: usize,
    pub timed_out: usize,
    pub budget_exceeded: usize,
    pub elapsed_ms: u64,
}

/// Records in input order plus stats.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub records: Vec<FetchRecord>,
    pub stats: FetchStats,
}

impl FetchReport {
    /// Successfully fetched pages, in input order.
    pub fn pages(&self) -> impl Iterator<Item = &FetchedPage> {
        self.records.iter().filter_map(FetchRecord::page)
    }
}

/// Cache lookup, then extraction and cache write on a miss.
async fn fetch_one<E, C>(
    url: &str,
    normalized_url: &str,
    extractor: &E,
    cache: &C,
    config: &FetchConfig,
    now: DateTime<Utc>,
) -> Result<FetchedPage, FetchFailure>
where
    E: ContentExtractor,
    C: EvidenceCache,
{
    match cache.get_entry(normalized_url).await {
        Ok(Some(entry)) if !entry.is_stale(now) => {
            debug!(url = %url, "cache hit");
            return Ok(FetchedPage::from_entry(url, &entry, true));
        }
        Ok(_) => {}
        Err(e) => warn!(url = %url, error = %e, "cache read failed; fetching"),
    }

    let extracted = extractor
        .extract(url)
        .await
        .map_err(|e| FetchFailure::Extraction(e.to_string()))?;

    let entry = CacheEntry::new(normalized_url, extracted, now)
        .with_staleness_window(config.staleness_window_days);
    if let Err(e) = cache.upsert_entry(&entry).await {
        warn!(url = %url, error = %e, "cache write failed");
    }

    debug!(url = %url, chars = entry.raw_text.len(), "fetched");
    Ok(FetchedPage::from_entry(url, &entry, false))
}

/// Fetch and extract every URL.
///
/// Never fails as a whole; per-URL failures are recorded on the record.
pub async fn fetch_all<E, C>(
    urls: &[String],
    extractor: &E,
    cache: &C,
    config: &FetchConfig,
    now: DateTime<Utc>,
) -> FetchReport
where
    E: ContentExtractor,
    C: EvidenceCache,
{
    let started = Instant::now();
    let budget = config.batch_budget();
    let task_timeout = config.task_timeout();
    let semaphore = Semaphore::new(config.concurrency.max(1));

    let tasks = urls.iter().map(|url| {
        let semaphore = &semaphore;
        async move {
            let Some(normalized_url) = canonicalize_url(url) else {
                debug!(url = %url, "invalid url");
                return FetchRecord {
                    url: url.clone(),
                    normalized_url: None,
                    outcome: Err(FetchFailure::InvalidUrl),
                };
            };

            let _permit = semaphore.acquire().await.ok();

            let outcome = match budget {
                Some(budget) if started.elapsed() >= budget => {
                    debug!(url = %url, "batch budget exhausted; skipping");
                    Err(FetchFailure::BudgetExceeded)
                }
                _ => {
                    let attempt = fetch_one(url, &normalized_url, extractor, cache, config, now);
                    match timeout(task_timeout, attempt).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(url = %url, timeout_ms = config.task_timeout_ms, "fetch timed out");
                            Err(FetchFailure::Timeout {
                                elapsed_ms: config.task_timeout_ms,
                            })
                        }
                    }
                }
            };

            FetchRecord {
                url: url.clone(),
                normalized_url: Some(normalized_url),
                outcome,
            }
        }
    });
    let records = join_all(tasks).await;

    let mut stats = FetchStats::default();
    for record in &records {
        match &record.outcome {
            Ok(page) => {
                stats.succeeded += 1;
                if page.from_cache {
                    stats.cache_hits += 1;
                } else {
                    stats.cache_misses += 1;
                }
            }
            Err(failure) => {
                stats.failed += 1;
                match failure {
                    FetchFailure::Timeout { .. } => {
                        stats.timed_out += 1;
                        stats.cache_misses += 1;
                    }
                    FetchFailure::BudgetExceeded => stats.budget_exceeded += 1,
                    FetchFailure::Extraction(_) => stats.cache_misses += 1,
                    FetchFailure::InvalidUrl => {}
                }
            }
        }
    }
    stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(
        urls = urls.len(),
        succeeded = stats.succeeded,
        failed = stats.failed,
        cache_hits = stats.cache_hits,
        timed_out = stats.timed_out,
        budget_exceeded = stats.budget_exceeded,
        elapsed_ms = stats.elapsed_ms,
        "fetch batch complete"
    );

    FetchReport { records, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EvidenceError, Result};
    use crate::stores::MemoryStore;
    use crate::testing::MockExtractor;
    use crate::types::{page::ExtractedContent, summary::PageSummary};
    use async_trait::async_trait;
    use std::time::Duration;

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_record_per_url_in_order() {
        let extractor = MockExtractor::new()
            .with_page("https://acme.com/pricing", ExtractedContent::new("Pro $49"))
            .with_failure("https://acme.com/broken", "404");
        let store = MemoryStore::new();
        let input = urls(&["https://acme.com/pricing", "not a url at all", "https://acme.com/broken"]);

        let report = fetch_all(&input, &extractor, &store, &FetchConfig::default(), Utc::now()).await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].page().unwrap().text, "Pro $49");
        assert_eq!(report.records[1].failure(), Some(&FetchFailure::InvalidUrl));
        assert!(matches!(report.records[2].failure(), Some(FetchFailure::Extraction(_))));
        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.failed, 2);
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_entry_is_reused() {
        let now = Utc::now();
        let store = MemoryStore::new();
        store
            .upsert_entry(&CacheEntry::new(
                "https://acme.com/docs",
                ExtractedContent::new("cached docs"),
                now - chrono::Duration::days(2),
            ))
            .await
            .unwrap();
        let extractor = MockExtractor::new().with_page("https://www.acme.com/docs/", ExtractedContent::new("fresh"));

        let report = fetch_all(
            &urls(&["https://www.acme.com/docs/"]),
            &extractor,
            &store,
            &FetchConfig::default(),
            now,
        )
        .await;

        let page = report.records[0].page().unwrap();
        assert!(page.from_cache);
        assert_eq!(page.text, "cached docs");
        assert_eq!(extractor.call_count(), 0);
        assert_eq!(report.stats.cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_refetched() {
        let now = Utc::now();
        let store = MemoryStore::new();
        store
            .upsert_entry(&CacheEntry::new(
                "https://acme.com/docs",
                ExtractedContent::new("old docs"),
                now - chrono::Duration::days(8),
            ))
            .await
            .unwrap();
        let extractor = MockExtractor::new().with_page("https://acme.com/docs", ExtractedContent::new("new docs"));

        let report = fetch_all(&urls(&["https://acme.com/docs"]), &extractor, &store, &FetchConfig::default(), now).await;

        let page = report.records[0].page().unwrap();
        assert!(!page.from_cache);
        assert_eq!(page.text, "new docs");
        assert_eq!(report.stats.cache_misses, 1);
        let stored = store.get_entry("https://acme.com/docs").await.unwrap().unwrap();
        assert_eq!(stored.raw_text, "new docs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_only_slow_url() {
        let extractor = MockExtractor::new()
            .with_page("https://slow.com", ExtractedContent::new("slow"))
            .with_delay("https://slow.com", Duration::from_secs(20))
            .with_page("https://fast.com", ExtractedContent::new("fast"));
        let config = FetchConfig::default().with_task_timeout(Duration::from_secs(15));

        let report = fetch_all(
            &urls(&["https://slow.com", "https://fast.com"]),
            &extractor,
            &MemoryStore::new(),
            &config,
            Utc::now(),
        )
        .await;

        assert_eq!(
            report.records[0].failure(),
            Some(&FetchFailure::Timeout { elapsed_ms: 15_000 })
        );
        assert!(report.records[1].page().is_some());
        assert_eq!(report.stats.timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_skips_unstarted_tasks() {
        let mut extractor = MockExtractor::new();
        for i in 0..3 {
            let url = format!("https://site{}.com", i);
            extractor = extractor
                .with_page(&url, ExtractedContent::new(format!("page {}", i)))
                .with_delay(&url, Duration::from_secs(6));
        }
        let config = FetchConfig::default()
            .with_concurrency(1)
            .with_batch_budget(Some(Duration::from_secs(10)));

        let report = fetch_all(
            &urls(&["https://site0.com", "https://site1.com", "https://site2.com"]),
            &extractor,
            &MemoryStore::new(),
            &config,
            Utc::now(),
        )
        .await;

        assert!(report.records[0].page().is_some());
        assert!(report.records[1].page().is_some());
        assert_eq!(report.records[2].failure(), Some(&FetchFailure::BudgetExceeded));
        assert_eq!(report.stats.budget_exceeded, 1);
        assert_eq!(extractor.call_count(), 2);
    }

    fn slow_sites(count: usize) -> (MockExtractor, Vec<String>) {
        let mut extractor = MockExtractor::new();
        let mut input = Vec::new();
        for i in 0..count {
            let url = format!("https://site{}.com/pricing", i);
            extractor = extractor
                .with_page(&url, ExtractedContent::new(format!("page {}", i)))
                .with_delay(&url, Duration::from_secs(1));
            input.push(url);
        }
        (extractor, input)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_concurrency_is_bounded() {
        for config in [FetchConfig::default(), FetchConfig::default().with_concurrency(3)] {
            let (extractor, input) = slow_sites(20);
            let report = fetch_all(&input, &extractor, &MemoryStore::new(), &config, Utc::now()).await;

            assert_eq!(report.stats.succeeded, 20);
            assert_eq!(extractor.peak_in_flight(), config.concurrency);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stale_cache_entry_does_not_abort_batch() {
        let now = Utc::now();
        let store = MemoryStore::new();
        store
            .upsert_entry(
                &CacheEntry::new("https://acme.com/docs", ExtractedContent::new("cached"), now)
                    .with_staleness_window(u32::MAX),
            )
            .await
            .unwrap();
        let extractor = MockExtractor::new();

        let report = fetch_all(&urls(&["https://acme.com/docs"]), &extractor, &store, &FetchConfig::default(), now).await;
        assert!(report.records[0].page().unwrap().from_cache);
    }

    struct BrokenCache;

    #[async_trait]
    impl EvidenceCache for BrokenCache {
        async fn get_entry(&self, _: &str) -> Result<Option<CacheEntry>> {
            Ok(None)
        }

        async fn upsert_entry(&self, _: &CacheEntry) -> Result<()> {
            Err(EvidenceError::storage("disk full"))
        }

        async fn attach_summary(&self, _: &str, _: &str, _: &PageSummary, _: &str) -> Result<bool> {
            Err(EvidenceError::storage("disk full"))
        }

        async fn count_entries(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_write_failure_is_not_fatal() {
        let extractor = MockExtractor::new().with_page("https://acme.com", ExtractedContent::new("home"));
        let report = fetch_all(&urls(&["https://acme.com"]), &extractor, &BrokenCache, &FetchConfig::default(), Utc::now()).await;
        assert_eq!(report.stats.succeeded, 1);
    }
}
