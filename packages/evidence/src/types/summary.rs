//! Triage summary types - the cheap Pass A view of a fetched page.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::category::EvidenceCategory;

/// How recent the page content appears to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecencyHint {
    Last30Days,
    Last90Days,
    LastYear,
    Older,
    #[default]
    Unknown,
}

/// Who published the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityHint {
    Official,
    #[default]
    ThirdParty,
    Community,
}

/// Structured triage summary for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub category: EvidenceCategory,

    /// Short evidence signals ("Pro plan $49/mo", "SOC 2 Type II")
    #[serde(default)]
    pub signals: Vec<String>,

    /// How much useful evidence the page carries, in [0, 1]
    pub coverage_score: f32,

    #[serde(default)]
    pub recency_hint: RecencyHint,

    #[serde(default)]
    pub credibility_hint: CredibilityHint,

    pub recommended_for_deep_read: bool,
}

/// What the summarizer is asked to return.
///
/// Kept lenient (free-form category, unclamped score) so that near-miss
/// outputs survive; [`TriageResponse::into_summary`] normalizes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriageResponse {
    /// One of: pricing, docs, changelog, status, reviews, jobs, security, community, blog, other
    pub category: String,

    /// Up to 8 short factual signals found on the page
    #[serde(default)]
    pub signals: Vec<String>,

    /// 0.0 to 1.0: how much concrete competitor evidence the page holds
    pub coverage_score: f64,

    #[serde(default)]
    pub recency_hint: RecencyHint,

    #[serde(default)]
    pub credibility_hint: CredibilityHint,

    pub recommended_for_deep_read: bool,
}

impl TriageResponse {
    /// Normalize into a [`PageSummary`].
    pub fn into_summary(self, max_signals: usize) -> PageSummary {
        let coverage_score = if self.coverage_score.is_finite() {
            self.coverage_score.clamp(0.0, 1.0) as f32
        } else {
            0.0
        };

        let signals = self
            .signals
            .into_iter()
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty())
            .take(max_signals)
            .collect();

        PageSummary {
            category: EvidenceCategory::parse(&self.category),
            signals,
            coverage_score,
            recency_hint: self.recency_hint,
            credibility_hint: self.credibility_hint,
            recommended_for_deep_read: self.recommended_for_deep_read,
        }
    }
}
