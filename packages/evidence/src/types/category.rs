//! Evidence categories.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of evidence categories.
///
/// Harvesting, caching and triage use all ten variants. Claims use the
/// nine-category partition produced by [`EvidenceCategory::claim_category`],
/// where `Status` is folded into `Changelog`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Pricing,
    Docs,
    Changelog,
    Status,
    Reviews,
    Jobs,
    Security,
    Community,
    Blog,
    Other,
}

impl EvidenceCategory {
    /// All categories in canonical order.
    pub const ALL: [EvidenceCategory; 10] = [
        Self::Pricing,
        Self::Docs,
        Self::Changelog,
        Self::Status,
        Self::Reviews,
        Self::Jobs,
        Self::Security,
        Self::Community,
        Self::Blog,
        Self::Other,
    ];

    /// The nine categories a claim can carry.
    pub const CLAIM_CATEGORIES: [EvidenceCategory; 9] = [
        Self::Pricing,
        Self::Docs,
        Self::Changelog,
        Self::Reviews,
        Self::Jobs,
        Self::Security,
        Self::Community,
        Self::Blog,
        Self::Other,
    ];

    /// Parse a free-form category label. Never fails: unknown input is `Other`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "pricing" | "price" | "plans" => Self::Pricing,
            "docs" | "documentation" | "doc" | "api_docs" => Self::Docs,
            "changelog" | "release_notes" | "releases" => Self::Changelog,
            "status" | "uptime" | "incidents" => Self::Status,
            "reviews" | "review" => Self::Reviews,
            "jobs" | "careers" | "hiring" => Self::Jobs,
            "security" | "trust" | "compliance" => Self::Security,
            "community" | "forum" | "forums" => Self::Community,
            "blog" | "news" => Self::Blog,
            _ => Self::Other,
        }
    }

    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pricing => "pricing",
            Self::Docs => "docs",
            Self::Changelog => "changelog",
            Self::Status => "status",
            Self::Reviews => "reviews",
            Self::Jobs => "jobs",
            Self::Security => "security",
            Self::Community => "community",
            Self::Blog => "blog",
            Self::Other => "other",
        }
    }

    /// Map onto the nine-category claim partition.
    ///
    /// Lossy: `Status` becomes `Changelog` and cannot be recovered.
    pub fn claim_category(self) -> Self {
        match self {
            Self::Status => Self::Changelog,
            other => other,
        }
    }

    /// Whether a search scoped to the competitor's own domain is useful.
    pub fn has_first_party_source(&self) -> bool {
        !matches!(self, Self::Reviews | Self::Community | Self::Other)
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for EvidenceCategory {
    fn default() -> Self {
        Self::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_aliases() {
        assert_eq!(EvidenceCategory::parse("Pricing"), EvidenceCategory::Pricing);
        assert_eq!(EvidenceCategory::parse("documentation"), EvidenceCategory::Docs);
        assert_eq!(EvidenceCategory::parse("release-notes"), EvidenceCategory::Changelog);
        assert_eq!(EvidenceCategory::parse(" careers "), EvidenceCategory::Jobs);
    }

    #[test]
    fn test_unknown_is_other() {
        assert_eq!(EvidenceCategory::parse("podcasts"), EvidenceCategory::Other);
        assert_eq!(EvidenceCategory::parse(""), EvidenceCategory::Other);
    }

    #[test]
    fn test_status_folds_into_changelog() {
        assert_eq!(
            EvidenceCategory::Status.claim_category(),
            EvidenceCategory::Changelog
        );
        for c in EvidenceCategory::CLAIM_CATEGORIES {
            assert_eq!(c.claim_category(), c);
        }
    }

    #[test]
    fn test_label_roundtrip() {
        for c in EvidenceCategory::ALL {
            assert_eq!(EvidenceCategory::parse(c.as_str()), c);
        }
    }
}
