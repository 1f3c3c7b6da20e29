//! Pass B deep reads and the deep-harvest orchestrator.
//!
//! Deep reads are the expensive step, so they only ever run on the
//! shortlist produced by Pass A.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::pipeline::claims::claims_from_findings;
use crate::pipeline::fetch::{fetch_all, FetchReport};
use crate::pipeline::triage::{select_shortlist, triage_pages, ShortlistEntry, TriageReport};
use crate::traits::{
    deep_reader::DeepReader, extractor::ContentExtractor, store::EvidenceCache,
    summarizer::Summarizer,
};
use crate::types::{claim::EvidenceClaim, config::{DeepReadConfig, PipelineConfig}};

/// Pass B result for one shortlisted page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepReadRecord {
    pub url: String,
    /// Claims extracted from the page, or why the read failed
    pub outcome: Result<Vec<EvidenceClaim>, String>,
}

/// Run the deep reader over the shortlist only.
///
/// One record per shortlist entry, in shortlist order.
pub async fn deep_read_shortlist<R: DeepReader>(
    shortlist: &[ShortlistEntry],
    reader: &R,
    config: &DeepReadConfig,
) -> Vec<DeepReadRecord> {
    let semaphore = Semaphore::new(config.concurrency.max(1));
    let read_timeout = config.timeout();

    join_all(shortlist.iter().map(|entry| {
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore.acquire().await.ok();
            let url = entry.page.url.clone();

            let outcome = match timeout(read_timeout, reader.deep_read(&entry.page, &entry.summary)).await {
                Ok(Ok(findings)) => {
                    debug!(url = %url, findings = findings.len(), "deep read complete");
                    Ok(claims_from_findings(&entry.page, &entry.summary, &findings))
                }
                Ok(Err(e)) => {
                    warn!(url = %url, error = %e, "deep read failed");
                    Err(e.to_string())
                }
                Err(_) => {
                    warn!(url = %url, timeout_ms = config.timeout_ms, "deep read timed out");
                    Err(format!("timed out after {}ms", config.timeout_ms))
                }
            };

            DeepReadRecord { url, outcome }
        }
    }))
    .await
}

/// Everything a deep harvest produced, stage by stage.
#[derive(Debug, Clone, Serialize)]
pub struct DeepHarvestReport {
    pub fetch: FetchReport,
    pub triage: TriageReport,
    pub shortlist: Vec<ShortlistEntry>,
    pub deep_reads: Vec<DeepReadRecord>,
}

impl DeepHarvestReport {
    /// Every claim extracted by Pass B, in shortlist order.
    pub fn claims(&self) -> Vec<EvidenceClaim> {
        self.deep_reads
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .flatten()
            .cloned()
            .collect()
    }
}

/// Fetch, triage, shortlist and deep-read a list of candidate URLs.
///
/// ```rust,ignore
/// let deep = DeepHarvest::new(HttpExtractor::new()?, summarizer, store);
/// let report = deep.run(&urls, &reader, Utc::now()).await;
/// let claims = report.claims();
/// ```
pub struct DeepHarvest<E: ContentExtractor, S: Summarizer, C: EvidenceCache> {
    extractor: E,
    summarizer: S,
    cache: C,
    config: PipelineConfig,
}

impl<E: ContentExtractor, S: Summarizer, C: EvidenceCache> DeepHarvest<E, S, C> {
    pub fn new(extractor: E, summarizer: S, cache: C) -> Self {
        Self {
            extractor,
            summarizer,
            cache,
            config: PipelineConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(extractor: E, summarizer: S, cache: C, config: PipelineConfig) -> Self {
        Self {
            extractor,
            summarizer,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Run every stage. Never fails as a whole.
    pub async fn run<R: DeepReader>(
        &self,
        urls: &[String],
        reader: &R,
        now: DateTime<Utc>,
    ) -> DeepHarvestReport {
        let fetch = fetch_all(urls, &self.extractor, &self.cache, &self.config.fetch, now).await;

        let pages: Vec<_> = fetch.pages().cloned().collect();
        let triage = triage_pages(&pages, &self.summarizer, &self.cache, &self.config.triage).await;

        let shortlist = select_shortlist(&triage.records, &self.config.shortlist);
        let deep_reads = deep_read_shortlist(&shortlist, reader, &self.config.deep_read).await;

        info!(
            urls = urls.len(),
            fetched = pages.len(),
            triaged = triage.records.len() - triage.stats.dropped,
            shortlisted = shortlist.len(),
            "deep harvest complete"
        );

        DeepHarvestReport {
            fetch,
            triage,
            shortlist,
            deep_reads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::triage::ShortlistReason;
    use crate::testing::{fetched_page, sample_summary, MockDeepReader};
    use crate::traits::deep_reader::DeepFinding;
    use std::time::Duration;

    fn entry(url: &str) -> ShortlistEntry {
        ShortlistEntry {
            page: fetched_page(url, "page text"),
            summary: sample_summary(0.8),
            reason: ShortlistReason::Quota,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deep_read_records_per_entry() {
        let reader = MockDeepReader::new()
            .with_findings("https://acme.com/pricing", vec![DeepFinding::new("Pro plan is $49/user")])
            .with_failure("https://acme.com/docs", "model refused")
            .with_delay("https://acme.com/slow", Duration::from_secs(120));
        let shortlist = vec![
            entry("https://acme.com/pricing"),
            entry("https://acme.com/docs"),
            entry("https://acme.com/slow"),
        ];

        let records = deep_read_shortlist(&shortlist, &reader, &DeepReadConfig::default()).await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].outcome.as_ref().unwrap().len(), 1);
        assert!(records[1].outcome.is_err());
        assert!(records[2].outcome.as_ref().unwrap_err().contains("timed out"));
    }
}
