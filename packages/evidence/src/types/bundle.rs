//! Evidence bundle - the immutable, versioned output of a harvest.
//!
//! A new harvest always produces a new bundle. Bundles are appended to the
//! artifact store and never updated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::category::EvidenceCategory;

/// Current persisted bundle schema.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Snapshot of harvested sources grouped by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    pub schema_version: u32,
    pub meta: BundleMeta,
    pub groups: Vec<CategoryGroup>,
    pub totals: BundleTotals,
}

impl EvidenceBundle {
    /// Get the group for a category, if it was harvested.
    pub fn group(&self, category: EvidenceCategory) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.category == category)
    }

    /// Iterate every source together with its group category.
    pub fn sources(&self) -> impl Iterator<Item = (EvidenceCategory, &BundleSource)> {
        self.groups
            .iter()
            .flat_map(|g| g.sources.iter().map(move |s| (g.category, s)))
    }

    /// A bundle with no sources at all.
    pub fn is_empty(&self) -> bool {
        self.totals.sources == 0
    }
}

/// Harvest context recorded alongside the sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub harvested_at: DateTime<Utc>,
    pub limit_per_category: usize,
}

/// Sources and stats for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub category: EvidenceCategory,
    pub queries: Vec<String>,
    pub sources: Vec<BundleSource>,
    pub stats: HarvestStats,
}

/// Who is speaking in a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Published on the competitor's own domain
    Official,
    /// Independent commentary (review sites, press, analysts)
    ThirdParty,
    /// User-generated discussion (forums, Q&A, social)
    Community,
}

/// One harvested, normalized search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSource {
    pub title: String,
    /// Canonical URL
    pub url: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub source_type: SourceType,
}

/// Per-category harvest accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestStats {
    /// Results asked of the search provider (queries x per-query hint)
    pub requested: usize,
    /// Raw results actually returned
    pub returned: usize,
    /// Sources kept after dedup and truncation
    pub kept: usize,
    /// Results dropped as canonical-URL duplicates
    pub deduped: usize,
    /// Distinct domains among kept sources
    pub unique_domains: usize,
}

/// Bundle-wide aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTotals {
    pub sources: usize,
    pub unique_urls: usize,
    pub unique_domains: usize,
    pub by_category: BTreeMap<EvidenceCategory, usize>,
}
