//! Claim loader - turn bundle sources, persisted rows and deep-read
//! findings into fingerprinted claims.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::pipeline::normalize::{
    canonical_or_raw, collapse_whitespace, extract_domain, normalize_claim_text, normalize_domain,
    normalize_excerpt,
};
use crate::traits::deep_reader::DeepFinding;
use crate::types::{
    bundle::EvidenceBundle,
    category::EvidenceCategory,
    claim::{ClaimConfidence, EvidenceClaim, EvidenceRow},
    page::FetchedPage,
    summary::PageSummary,
};

/// Excerpt budget applied to every claim excerpt.
pub const CLAIM_EXCERPT_MAX_CHARS: usize = 400;

const FIELD_SEPARATOR: char = '\u{1f}';

/// Fingerprint of a claim's identity fields.
///
/// Inputs are normalized here, so callers may pass raw text.
pub fn fingerprint(
    claim_text: &str,
    canonical_url: &str,
    category: EvidenceCategory,
    excerpt: Option<&str>,
) -> String {
    let excerpt = excerpt
        .map(|e| normalize_excerpt(e, CLAIM_EXCERPT_MAX_CHARS))
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(normalize_claim_text(claim_text).as_bytes());
    hasher.update([FIELD_SEPARATOR as u8]);
    hasher.update(canonical_url.as_bytes());
    hasher.update([FIELD_SEPARATOR as u8]);
    hasher.update(category.as_str().as_bytes());
    hasher.update([FIELD_SEPARATOR as u8]);
    hasher.update(excerpt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Everything needed to build one claim; normalization happens in `build`.
struct ClaimDraft<'a> {
    id: Option<String>,
    claim_text: &'a str,
    category: EvidenceCategory,
    url: &'a str,
    domain: Option<&'a str>,
    title: Option<&'a str>,
    excerpt: Option<&'a str>,
    published_at: Option<DateTime<Utc>>,
    retrieved_at: Option<DateTime<Utc>>,
    confidence: Option<ClaimConfidence>,
}

impl ClaimDraft<'_> {
    fn build(self, position: usize) -> Option<EvidenceClaim> {
        let claim_text = normalize_claim_text(self.claim_text);
        if claim_text.is_empty() {
            return None;
        }

        let canonical_url = canonical_or_raw(self.url);
        let domain = self
            .domain
            .map(normalize_domain)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| extract_domain(&canonical_url));
        let category = self.category.claim_category();
        let excerpt = self
            .excerpt
            .map(|e| normalize_excerpt(e, CLAIM_EXCERPT_MAX_CHARS))
            .filter(|e| !e.is_empty());
        let fingerprint = fingerprint(&claim_text, &canonical_url, category, excerpt.as_deref());
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{}", &fingerprint[..12], position));

        Some(EvidenceClaim {
            id,
            claim_text,
            category,
            url: self.url.trim().to_string(),
            canonical_url,
            domain,
            title: self
                .title
                .map(collapse_whitespace)
                .filter(|t| !t.is_empty()),
            excerpt,
            published_at: self.published_at,
            retrieved_at: self.retrieved_at,
            confidence: self.confidence,
            fingerprint,
            score: 0.0,
        })
    }
}

fn first_non_blank<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

/// Claims for every source of a bundle, in bundle order.
///
/// The claim text is the snippet, else the title. Retrieval time is the
/// bundle's harvest time.
pub fn claims_from_bundle(bundle: &EvidenceBundle) -> Vec<EvidenceClaim> {
    let retrieved_at = Some(bundle.meta.harvested_at);
    let claims: Vec<EvidenceClaim> = bundle
        .sources()
        .enumerate()
        .filter_map(|(position, (category, source))| {
            let text = first_non_blank(&[source.snippet.as_deref(), Some(source.title.as_str())])?;
            ClaimDraft {
                id: None,
                claim_text: text,
                category,
                url: &source.url,
                domain: Some(&source.domain),
                title: Some(&source.title),
                excerpt: source.snippet.as_deref(),
                published_at: source.published_date,
                retrieved_at,
                confidence: None,
            }
            .build(position)
        })
        .collect();

    debug!(sources = bundle.totals.sources, claims = claims.len(), "claims loaded from bundle");
    claims
}

/// Claim for one persisted evidence row; `None` when the row has no usable
/// text.
pub fn claim_from_row(row: &EvidenceRow, position: usize) -> Option<EvidenceClaim> {
    let text = first_non_blank(&[
        Some(row.claim_text.as_str()),
        row.excerpt.as_deref(),
        row.title.as_deref(),
    ]);
    let Some(text) = text else {
        debug!(id = %row.id, url = %row.url, "skipping evidence row without text");
        return None;
    };

    ClaimDraft {
        id: Some(row.id.clone()),
        claim_text: text,
        category: EvidenceCategory::parse(&row.category),
        url: &row.url,
        domain: row.domain.as_deref(),
        title: row.title.as_deref(),
        excerpt: row.excerpt.as_deref(),
        published_at: row.published_at,
        retrieved_at: row.retrieved_at,
        confidence: row.confidence.as_deref().and_then(ClaimConfidence::parse),
    }
    .build(position)
}

/// Claims for persisted rows, in row order.
pub fn claims_from_rows(rows: &[EvidenceRow]) -> Vec<EvidenceClaim> {
    rows.iter()
        .enumerate()
        .filter_map(|(position, row)| claim_from_row(row, position))
        .collect()
}

/// Claims for the findings of one deep read. The category comes from the
/// page's triage summary.
pub fn claims_from_findings(
    page: &FetchedPage,
    summary: &PageSummary,
    findings: &[DeepFinding],
) -> Vec<EvidenceClaim> {
    findings
        .iter()
        .enumerate()
        .filter_map(|(position, finding)| {
            ClaimDraft {
                id: None,
                claim_text: &finding.claim_text,
                category: summary.category,
                url: &page.url,
                domain: None,
                title: page.title.as_deref(),
                excerpt: finding.excerpt.as_deref(),
                published_at: finding.published_at,
                retrieved_at: Some(page.fetched_at),
                confidence: finding.confidence,
            }
            .build(position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_bundle, sample_summary};
    use crate::types::page::{CacheEntry, ExtractedContent};

    #[test]
    fn test_fingerprint_is_pure() {
        let a = fingerprint("Pro plan  $49", "https://acme.com/pricing", EvidenceCategory::Pricing, Some("x"));
        let b = fingerprint("Pro plan $49", "https://acme.com/pricing", EvidenceCategory::Pricing, Some("x"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_per_field() {
        let base = fingerprint("Pro $49", "https://acme.com/pricing", EvidenceCategory::Pricing, Some("x"));
        let variants = [
            fingerprint("Pro $59", "https://acme.com/pricing", EvidenceCategory::Pricing, Some("x")),
            fingerprint("Pro $49", "https://acme.com/plans", EvidenceCategory::Pricing, Some("x")),
            fingerprint("Pro $49", "https://acme.com/pricing", EvidenceCategory::Docs, Some("x")),
            fingerprint("Pro $49", "https://acme.com/pricing", EvidenceCategory::Pricing, Some("y")),
            fingerprint("Pro $49", "https://acme.com/pricing", EvidenceCategory::Pricing, None),
        ];
        for v in variants {
            assert_ne!(base, v);
        }
    }

    #[test]
    fn test_claims_from_bundle() {
        let bundle = sample_bundle("Acme", 3);
        let claims = claims_from_bundle(&bundle);

        assert_eq!(claims.len(), 3);
        assert!(claims
            .iter()
            .all(|c| c.retrieved_at == Some(bundle.meta.harvested_at)));
        assert!(claims.iter().all(|c| c.category != EvidenceCategory::Status));
        let ids: std::collections::HashSet<_> = claims.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_row_text_fallbacks() {
        let row = EvidenceRow {
            id: "row-1".into(),
            claim_text: "   ".into(),
            category: "Status".into(),
            url: "http://www.acme.com/status/".into(),
            title: Some("Acme Status".into()),
            confidence: Some("bogus".into()),
            ..Default::default()
        };
        let claim = claim_from_row(&row, 0).unwrap();

        assert_eq!(claim.id, "row-1");
        assert_eq!(claim.claim_text, "Acme Status");
        assert_eq!(claim.category, EvidenceCategory::Changelog);
        assert_eq!(claim.canonical_url, "https://acme.com/status");
        assert_eq!(claim.domain, "acme.com");
        assert_eq!(claim.confidence, None);

        let with_excerpt = EvidenceRow {
            excerpt: Some("All systems operational".into()),
            ..row.clone()
        };
        assert_eq!(
            claim_from_row(&with_excerpt, 0).unwrap().claim_text,
            "All systems operational"
        );

        let empty = EvidenceRow {
            title: None,
            ..row
        };
        assert!(claim_from_row(&empty, 0).is_none());
    }

    #[test]
    fn test_claims_from_findings() {
        let entry = CacheEntry::new(
            "https://acme.com/pricing",
            ExtractedContent::new("Pricing page").with_title("Pricing"),
            Utc::now(),
        );
        let page = FetchedPage::from_entry("https://www.acme.com/pricing", &entry, false);
        let published = entry.fetched_at - chrono::Duration::days(3);
        let findings = vec![
            DeepFinding::new("Pro plan costs $49 per user")
                .with_confidence(ClaimConfidence::High)
                .with_excerpt("Pro  $49 / user / month")
                .with_published_at(published),
            DeepFinding::new("  "),
        ];

        let claims = claims_from_findings(&page, &sample_summary(0.8), &findings);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].canonical_url, "https://acme.com/pricing");
        assert_eq!(claims[0].retrieved_at, Some(entry.fetched_at));
        assert_eq!(claims[0].confidence, Some(ClaimConfidence::High));
        assert_eq!(claims[0].excerpt.as_deref(), Some("Pro $49 / user / month"));
        assert_eq!(claims[0].published_at, Some(published));
    }
}
