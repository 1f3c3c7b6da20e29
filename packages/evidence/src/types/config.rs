//! Configuration types for the evidence pipeline.
//!
//! Every quota, threshold and concurrency cap used by the pipeline lives
//! here with a named default, so callers (and tests) can override them per
//! run instead of relying on module-level constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::category::EvidenceCategory;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queries: QueryPackConfig,
    pub harvest: HarvestConfig,
    pub fetch: FetchConfig,
    pub triage: TriageConfig,
    pub shortlist: ShortlistConfig,
    pub deep_read: DeepReadConfig,
    pub dedup: DedupConfig,
    pub rank: RankConfig,
    pub coverage: CoverageConfig,
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Query pack construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPackConfig {
    /// Maximum queries generated per category. Default: 4.
    pub max_queries_per_category: usize,

    /// Free-text context is trimmed to this many characters. Default: 60.
    pub context_max_chars: usize,
}

impl Default for QueryPackConfig {
    fn default() -> Self {
        Self {
            max_queries_per_category: 4,
            context_max_chars: 60,
        }
    }
}

/// Search harvesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Search calls in flight at once. Default: 3.
    pub concurrency: usize,

    /// Sources kept per category after dedup. Default: 8.
    pub limit_per_category: usize,

    /// Result-count hint per query. Default: `limit_per_category`.
    pub results_per_query: Option<usize>,

    /// Excerpt budget in characters. Default: 400.
    pub excerpt_max_chars: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            limit_per_category: 8,
            results_per_query: None,
            excerpt_max_chars: 400,
        }
    }
}

impl HarvestConfig {
    /// Set concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-category limit.
    pub fn with_limit_per_category(mut self, limit: usize) -> Self {
        self.limit_per_category = limit;
        self
    }

    /// The result-count hint sent with each query, given the effective
    /// per-category limit for this run.
    pub fn per_query_hint(&self, limit_per_category: usize) -> usize {
        self.results_per_query.unwrap_or(limit_per_category).max(1)
    }
}

/// Parallel fetch+extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Fetch tasks in flight at once. Default: 8.
    pub concurrency: usize,

    /// Per-task timeout. Default: 15s.
    pub task_timeout_ms: u64,

    /// Overall batch budget; unstarted tasks past it are not attempted.
    /// Default: 90s.
    pub batch_budget_ms: Option<u64>,

    /// Freshness window written on new cache entries. Default: 7 days.
    pub staleness_window_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            task_timeout_ms: 15_000,
            batch_budget_ms: Some(90_000),
            staleness_window_days: super::page::DEFAULT_STALENESS_WINDOW_DAYS,
        }
    }
}

impl FetchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn batch_budget(&self) -> Option<Duration> {
        self.batch_budget_ms.map(Duration::from_millis)
    }

    /// Set concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-task timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set (or clear) the batch budget.
    pub fn with_batch_budget(mut self, budget: Option<Duration>) -> Self {
        self.batch_budget_ms = budget.map(|b| u64::try_from(b.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Pass A triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Summarizer calls in flight at once. Default: 4.
    pub concurrency: usize,

    /// Page text sent to the summarizer is cut to this length. Default: 6000.
    pub max_input_chars: usize,

    /// Signals kept per summary. Default: 8.
    pub max_signals: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_input_chars: 6_000,
            max_signals: 8,
        }
    }
}

/// Quota for one category in the shortlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryQuota {
    pub category: EvidenceCategory,
    pub quota: usize,
}

impl CategoryQuota {
    pub fn new(category: EvidenceCategory, quota: usize) -> Self {
        Self { category, quota }
    }
}

/// Shortlist selection for Pass B.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortlistConfig {
    /// Explicit per-category quotas, applied in this order.
    pub quotas: Vec<CategoryQuota>,

    /// Slots for each category without an explicit quota. Default: 1.
    pub remainder_quota: usize,

    /// Hard cap on the shortlist size. Default: 10.
    pub global_cap: usize,
}

impl Default for ShortlistConfig {
    fn default() -> Self {
        use EvidenceCategory::*;
        Self {
            quotas: vec![
                CategoryQuota::new(Pricing, 2),
                CategoryQuota::new(Docs, 2),
                CategoryQuota::new(Reviews, 2),
                CategoryQuota::new(Changelog, 1),
                CategoryQuota::new(Jobs, 1),
                CategoryQuota::new(Status, 1),
            ],
            remainder_quota: 1,
            global_cap: 10,
        }
    }
}

impl ShortlistConfig {
    /// Only the given quotas, no remainder slots, cap = sum of quotas.
    pub fn with_quotas(quotas: Vec<CategoryQuota>) -> Self {
        let global_cap = quotas.iter().map(|q| q.quota).sum();
        Self {
            quotas,
            remainder_quota: 0,
            global_cap,
        }
    }

    /// Sum of the explicit quotas; backfill aims for this total.
    pub fn quota_total(&self) -> usize {
        self.quotas.iter().map(|q| q.quota).sum()
    }

    pub fn quota_for(&self, category: EvidenceCategory) -> Option<usize> {
        self.quotas
            .iter()
            .find(|q| q.category == category)
            .map(|q| q.quota)
    }
}

/// Pass B deep reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepReadConfig {
    /// Deep reads in flight at once. Default: 2.
    pub concurrency: usize,

    /// Per-page timeout. Default: 60s.
    pub timeout_ms: u64,
}

impl Default for DeepReadConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            timeout_ms: 60_000,
        }
    }
}

impl DeepReadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Claim deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Same-URL claims strictly above this Jaccard similarity are merged.
    /// Default: 0.85.
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

/// Claim ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Recency bonus used when a claim has no date at all. Default: 0.7.
    pub undated_recency_bonus: f64,

    /// Multiplier for claims on a competitor domain. Default: 1.2.
    pub first_party_multiplier: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            undated_recency_bonus: 0.7,
            first_party_multiplier: 1.2,
        }
    }
}

/// Which minimum-viable-coverage rule gates confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvcRule {
    /// Pricing, docs and reviews must all be present
    #[default]
    CoreTriad,
    /// At least three of pricing, reviews, changelog, jobs, docs, including
    /// pricing or reviews
    ThreeOfFive,
}

/// How many gaps to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapMode {
    Capped(usize),
    Uncapped,
}

impl Default for GapMode {
    fn default() -> Self {
        Self::Capped(5)
    }
}

/// Coverage and confidence scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub mvc_rule: MvcRule,
    pub gap_mode: GapMode,

    /// Average claims per present category that earns the density boost.
    /// Default: 3.0.
    pub density_threshold: f64,

    /// Boost added to the coverage score when dense. Default: 0.05.
    pub density_boost: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            mvc_rule: MvcRule::default(),
            gap_mode: GapMode::default(),
            density_threshold: 3.0,
            density_boost: 0.05,
        }
    }
}
