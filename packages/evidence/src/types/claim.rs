//! Claim types - single evidence snippets tied to a source URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::EvidenceCategory;

/// Confidence attached to a claim by whoever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimConfidence {
    Low,
    Med,
    High,
}

impl ClaimConfidence {
    /// Parse a confidence label; unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "med" | "medium" => Some(Self::Med),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A single piece of evidence about the competitor.
///
/// `fingerprint` is a pure function of the normalized claim text, the
/// canonical URL, the category and the normalized excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceClaim {
    pub id: String,

    /// Normalized claim text
    pub claim_text: String,

    /// Always one of [`EvidenceCategory::CLAIM_CATEGORIES`]
    pub category: EvidenceCategory,

    /// URL as originally seen
    pub url: String,

    pub canonical_url: String,

    /// Lowercased, www-stripped host
    pub domain: String,

    pub title: Option<String>,

    pub excerpt: Option<String>,

    pub published_at: Option<DateTime<Utc>>,

    pub retrieved_at: Option<DateTime<Utc>>,

    pub confidence: Option<ClaimConfidence>,

    pub fingerprint: String,

    /// Set by the ranker; zero before ranking
    #[serde(default)]
    pub score: f64,
}

impl EvidenceClaim {
    /// The most relevant date for age calculations: published, else retrieved.
    pub fn effective_date(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.retrieved_at)
    }
}

/// A persisted evidence row, as stored by the application database.
///
/// Free-form string fields are normalized by the claim loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceRow {
    pub id: String,
    pub claim_text: String,
    pub category: String,
    pub url: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retrieved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confidence: Option<String>,
}
