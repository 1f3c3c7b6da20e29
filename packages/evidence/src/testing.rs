//! Testing utilities including mock implementations.
//!
//! Deterministic fakes for every external capability, plus small fixture
//! builders, so pipelines can be exercised without network calls.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{EvidenceError, Result};
use crate::pipeline::claims::fingerprint;
use crate::pipeline::normalize::{canonical_or_raw, extract_domain, normalize_claim_text};
use crate::traits::{
    deep_reader::{DeepFinding, DeepReader},
    extractor::ContentExtractor,
    summarizer::Summarizer,
};
use crate::types::{
    bundle::{
        BundleMeta, BundleSource, BundleTotals, CategoryGroup, EvidenceBundle, HarvestStats,
        SourceType, BUNDLE_SCHEMA_VERSION,
    },
    category::EvidenceCategory,
    claim::EvidenceClaim,
    page::{CacheEntry, ExtractedContent, FetchedPage},
    summary::{CredibilityHint, PageSummary, RecencyHint},
};

/// Counts calls currently in flight and remembers the highest count seen.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    /// Mark a call as started until the returned guard drops.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Released on drop, including when a timed-out call is cancelled.
pub struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock content extractor.
///
/// Unknown URLs fail with an extraction error. Delays use `tokio::time`, so
/// they are skipped instantly under `start_paused` tests.
#[derive(Default)]
pub struct MockExtractor {
    pages: Arc<RwLock<HashMap<String, ExtractedContent>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    calls: Arc<RwLock<Vec<String>>>,
    in_flight: Arc<InFlightGauge>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `url`.
    pub fn with_page(self, url: &str, content: ExtractedContent) -> Self {
        self.pages.write().unwrap().insert(url.to_string(), content);
        self
    }

    /// Make `url` fail.
    pub fn with_failure(self, url: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.to_string(), message.to_string());
        self
    }

    /// Sleep before answering for `url`.
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(url.to_string(), delay);
        self
    }

    /// URLs extracted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Most extractions observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl ContentExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        let _in_flight = self.in_flight.enter();
        self.calls.write().unwrap().push(url.to_string());

        let delay = self.delays.read().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.read().unwrap().get(url) {
            return Err(EvidenceError::Extraction {
                url: url.to_string(),
                reason: message.clone(),
            });
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| EvidenceError::Extraction {
                url: url.to_string(),
                reason: "no mock page".to_string(),
            })
    }
}

/// A mock summarizer returning canned raw model output per URL.
#[derive(Default)]
pub struct MockSummarizer {
    outputs: Arc<RwLock<HashMap<String, String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `raw` verbatim when summarizing `url`.
    pub fn with_output(self, url: &str, raw: &str) -> Self {
        self.outputs
            .write()
            .unwrap()
            .insert(url.to_string(), raw.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, url: &str, _text: &str) -> Result<String> {
        self.calls.write().unwrap().push(url.to_string());
        self.outputs
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| EvidenceError::Summarizer(format!("no mock output for {}", url).into()))
    }
}

/// A mock deep reader with per-URL findings, failures and delays.
///
/// Unknown URLs yield no findings.
#[derive(Default)]
pub struct MockDeepReader {
    findings: Arc<RwLock<HashMap<String, Vec<DeepFinding>>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockDeepReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_findings(self, url: &str, findings: Vec<DeepFinding>) -> Self {
        self.findings
            .write()
            .unwrap()
            .insert(url.to_string(), findings);
        self
    }

    pub fn with_failure(self, url: &str, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.to_string(), message.to_string());
        self
    }

    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(url.to_string(), delay);
        self
    }

    /// Page URLs deep-read so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DeepReader for MockDeepReader {
    async fn deep_read(&self, page: &FetchedPage, _summary: &PageSummary) -> Result<Vec<DeepFinding>> {
        self.calls.write().unwrap().push(page.url.clone());

        let delay = self.delays.read().unwrap().get(&page.url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.read().unwrap().get(&page.url) {
            return Err(EvidenceError::DeepRead {
                url: page.url.clone(),
                reason: message.clone(),
            });
        }

        Ok(self
            .findings
            .read()
            .unwrap()
            .get(&page.url)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fixed timestamp used by fixtures.
pub fn sample_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

/// A triage summary with the given coverage score.
pub fn sample_summary(coverage_score: f32) -> PageSummary {
    PageSummary {
        category: EvidenceCategory::Pricing,
        signals: vec!["Pro plan $49/user/mo".to_string()],
        coverage_score,
        recency_hint: RecencyHint::Last90Days,
        credibility_hint: CredibilityHint::Official,
        recommended_for_deep_read: coverage_score >= 0.5,
    }
}

/// A bundle with `sources` pricing sources on the company's own domain.
pub fn sample_bundle(company: &str, sources: usize) -> EvidenceBundle {
    let domain = format!("{}.com", company.to_lowercase());
    let items: Vec<BundleSource> = (0..sources)
        .map(|i| BundleSource {
            title: format!("{} pricing {}", company, i),
            url: format!("https://{}/pricing/{}", domain, i),
            domain: domain.clone(),
            published_date: None,
            snippet: Some(format!("{} plan {} costs ${} per month", company, i, 10 * (i + 1))),
            source_type: SourceType::Official,
        })
        .collect();

    let group = CategoryGroup {
        category: EvidenceCategory::Pricing,
        queries: vec![format!("{} pricing", company)],
        stats: HarvestStats {
            requested: 8,
            returned: sources,
            kept: sources,
            deduped: 0,
            unique_domains: usize::from(sources > 0),
        },
        sources: items,
    };

    EvidenceBundle {
        schema_version: BUNDLE_SCHEMA_VERSION,
        meta: BundleMeta {
            company: company.to_string(),
            url: Some(domain),
            context: None,
            harvested_at: sample_time(),
            limit_per_category: 8,
        },
        totals: BundleTotals {
            sources,
            unique_urls: sources,
            unique_domains: usize::from(sources > 0),
            by_category: BTreeMap::from([(EvidenceCategory::Pricing, sources)]),
        },
        groups: vec![group],
    }
}

/// An undated claim with a real fingerprint and no excerpt.
pub fn claim(text: &str, url: &str, category: EvidenceCategory) -> EvidenceClaim {
    let canonical_url = canonical_or_raw(url);
    let category = category.claim_category();
    let fingerprint = fingerprint(text, &canonical_url, category, None);

    EvidenceClaim {
        id: fingerprint[..12].to_string(),
        claim_text: normalize_claim_text(text),
        category,
        url: url.to_string(),
        domain: extract_domain(&canonical_url),
        canonical_url,
        title: None,
        excerpt: None,
        published_at: None,
        retrieved_at: None,
        confidence: None,
        fingerprint,
        score: 0.0,
    }
}

/// A freshly fetched (not cached) page with the given text.
pub fn fetched_page(url: &str, text: &str) -> FetchedPage {
    let entry = CacheEntry::new(canonical_or_raw(url), ExtractedContent::new(text), sample_time());
    FetchedPage::from_entry(url, &entry, false)
}

/// The cache entry a fetch of `page` would have written.
pub fn cache_entry_for(page: &FetchedPage) -> CacheEntry {
    let mut extracted = ExtractedContent::new(page.text.clone());
    extracted.title = page.title.clone();
    CacheEntry::new(page.normalized_url.clone(), extracted, page.fetched_at)
}
