//! Two-pass shortlisting: Pass A triage and quota-based shortlist selection.
//!
//! Pass A produces a cheap [`PageSummary`] per fetched page, reusing cached
//! summaries for unchanged content. The shortlist decides which pages earn
//! the expensive Pass B deep read.

use futures::future::join_all;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{EvidenceError, Result};
use crate::pipeline::prompts::summary_schema_version;
use crate::traits::{store::EvidenceCache, summarizer::Summarizer};
use crate::types::{
    category::EvidenceCategory,
    config::{ShortlistConfig, TriageConfig},
    page::FetchedPage,
    summary::{PageSummary, TriageResponse},
};

static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").unwrap());
static RE_TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Deterministic repair of near-miss JSON: strip markdown fences, cut to
/// the outermost object, drop trailing commas.
pub fn repair_summary_json(raw: &str) -> String {
    let unfenced = RE_CODE_FENCE.replace_all(raw, "");
    let object = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced.trim(),
    };
    RE_TRAILING_COMMA.replace_all(object, "$1").into_owned()
}

/// Parse summarizer output, with exactly one repair attempt.
///
/// Returns the summary and whether repair was needed.
pub fn parse_triage_output(url: &str, raw: &str, max_signals: usize) -> Result<(PageSummary, bool)> {
    if let Ok(response) = serde_json::from_str::<TriageResponse>(raw.trim()) {
        return Ok((response.into_summary(max_signals), false));
    }

    let repaired = repair_summary_json(raw);
    serde_json::from_str::<TriageResponse>(&repaired)
        .map(|response| (response.into_summary(max_signals), true))
        .map_err(|e| EvidenceError::MalformedSummary {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Pass A result for one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageRecord {
    pub page: FetchedPage,
    /// Summary, or why the page was dropped from triage
    pub outcome: std::result::Result<PageSummary, String>,
    /// Reused from the cache for unchanged content
    pub from_cache: bool,
    /// Needed the repair pass to parse
    pub repaired: bool,
}

impl TriageRecord {
    pub fn summary(&self) -> Option<&PageSummary> {
        self.outcome.as_ref().ok()
    }
}

/// Pass A accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriageStats {
    pub cached: usize,
    pub summarized: usize,
    pub repaired: usize,
    pub dropped: usize,
}

/// Records in input order plus stats.
#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub records: Vec<TriageRecord>,
    pub stats: TriageStats,
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

async fn triage_one<S, C>(
    page: &FetchedPage,
    summarizer: &S,
    cache: &C,
    config: &TriageConfig,
    version: &str,
) -> TriageRecord
where
    S: Summarizer,
    C: EvidenceCache,
{
    let record = |outcome, from_cache, repaired| TriageRecord {
        page: page.clone(),
        outcome,
        from_cache,
        repaired,
    };

    match cache.get_entry(&page.normalized_url).await {
        Ok(Some(entry)) => {
            if let Some(summary) = entry.summary_for(&page.content_hash, version) {
                debug!(url = %page.url, "summary cache hit");
                return record(Ok(summary.clone()), true, false);
            }
        }
        Ok(None) => {}
        Err(e) => warn!(url = %page.url, error = %e, "cache read failed; summarizing"),
    }

    let input = truncate_chars(&page.text, config.max_input_chars);
    let raw = match summarizer.summarize(&page.url, input).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(url = %page.url, error = %e, "summarizer failed; dropping page from triage");
            return record(Err(e.to_string()), false, false);
        }
    };

    let (summary, repaired) = match parse_triage_output(&page.url, &raw, config.max_signals) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(url = %page.url, error = %e, "malformed summary; dropping page from triage");
            return record(Err(e.to_string()), false, false);
        }
    };

    match cache
        .attach_summary(&page.normalized_url, &page.content_hash, &summary, version)
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!(url = %page.url, "content changed since fetch; summary not cached"),
        Err(e) => warn!(url = %page.url, error = %e, "summary cache write failed"),
    }

    debug!(
        url = %page.url,
        category = %summary.category,
        coverage = summary.coverage_score,
        repaired,
        "page triaged"
    );
    record(Ok(summary), false, repaired)
}

/// Pass A: summarize every page in parallel.
///
/// Never fails as a whole; pages whose summary cannot be produced are
/// recorded as dropped.
pub async fn triage_pages<S, C>(
    pages: &[FetchedPage],
    summarizer: &S,
    cache: &C,
    config: &TriageConfig,
) -> TriageReport
where
    S: Summarizer,
    C: EvidenceCache,
{
    let version = summary_schema_version();
    let semaphore = Semaphore::new(config.concurrency.max(1));

    let records = join_all(pages.iter().map(|page| {
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore.acquire().await.ok();
            triage_one(page, summarizer, cache, config, version).await
        }
    }))
    .await;

    let mut stats = TriageStats::default();
    for record in &records {
        match (&record.outcome, record.from_cache) {
            (Err(_), _) => stats.dropped += 1,
            (Ok(_), true) => stats.cached += 1,
            (Ok(_), false) => {
                stats.summarized += 1;
                if record.repaired {
                    stats.repaired += 1;
                }
            }
        }
    }

    info!(
        pages = pages.len(),
        cached = stats.cached,
        summarized = stats.summarized,
        repaired = stats.repaired,
        dropped = stats.dropped,
        "triage complete"
    );

    TriageReport { records, stats }
}

/// Why a page made the shortlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortlistReason {
    /// Within an explicit category quota
    Quota,
    /// Within the slot given to a category without an explicit quota
    Remainder,
    /// Highest-scoring leftover used to reach the quota total
    Backfill,
}

/// A page selected for Pass B.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortlistEntry {
    pub page: FetchedPage,
    pub summary: PageSummary,
    pub reason: ShortlistReason,
}

fn by_coverage(a: &(&FetchedPage, &PageSummary), b: &(&FetchedPage, &PageSummary)) -> Ordering {
    b.1.coverage_score
        .total_cmp(&a.1.coverage_score)
        .then_with(|| a.0.normalized_url.cmp(&b.0.normalized_url))
}

/// Select pages for Pass B.
///
/// Explicit quotas are filled first in configured order, then one
/// remainder slot per other category, then the best leftovers until the
/// quota total is reached. The result never exceeds the global cap.
pub fn select_shortlist(records: &[TriageRecord], config: &ShortlistConfig) -> Vec<ShortlistEntry> {
    let mut seen_urls = HashSet::new();
    let mut candidates: Vec<(&FetchedPage, &PageSummary)> = records
        .iter()
        .filter_map(|r| r.summary().map(|s| (&r.page, s)))
        .filter(|(page, _)| seen_urls.insert(page.normalized_url.as_str()))
        .collect();
    candidates.sort_by(by_coverage);

    let cap = config.global_cap;
    let mut taken = vec![false; candidates.len()];
    let mut shortlist: Vec<ShortlistEntry> = Vec::new();

    let mut take_from_category =
        |category: EvidenceCategory, quota: usize, reason: ShortlistReason, shortlist: &mut Vec<ShortlistEntry>| {
            let mut picked = 0;
            for (i, (page, summary)) in candidates.iter().enumerate() {
                if picked >= quota || shortlist.len() >= cap {
                    break;
                }
                if taken[i] || summary.category != category {
                    continue;
                }
                taken[i] = true;
                picked += 1;
                shortlist.push(ShortlistEntry {
                    page: (*page).clone(),
                    summary: (*summary).clone(),
                    reason,
                });
            }
        };

    for quota in &config.quotas {
        take_from_category(quota.category, quota.quota, ShortlistReason::Quota, &mut shortlist);
    }
    for category in EvidenceCategory::ALL {
        if config.quota_for(category).is_none() {
            take_from_category(category, config.remainder_quota, ShortlistReason::Remainder, &mut shortlist);
        }
    }

    let target = config.quota_total().min(cap);
    for (i, (page, summary)) in candidates.iter().enumerate() {
        if shortlist.len() >= target {
            break;
        }
        if taken[i] {
            continue;
        }
        taken[i] = true;
        shortlist.push(ShortlistEntry {
            page: (*page).clone(),
            summary: (*summary).clone(),
            reason: ShortlistReason::Backfill,
        });
    }

    debug!(
        candidates = candidates.len(),
        shortlisted = shortlist.len(),
        "shortlist selected"
    );
    shortlist
}
