//! Claim deduplication.
//!
//! Two stages, first occurrence wins in both:
//! 1. exact: one claim per fingerprint
//! 2. near-duplicate: within one canonical URL, drop claims whose word-set
//!    Jaccard similarity to an accepted claim is strictly above the threshold
//!
//! Claims on different URLs are never compared textually.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::types::{claim::EvidenceClaim, config::DedupConfig};

/// Lowercase word tokens of a claim text.
pub fn word_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two token sets. Two empty sets are identical.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Token-set Jaccard similarity of two texts.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_tokens(a), &word_tokens(b))
}

/// Remove exact and near-duplicate claims, preserving input order.
pub fn dedup_claims(claims: Vec<EvidenceClaim>, config: &DedupConfig) -> Vec<EvidenceClaim> {
    let input = claims.len();

    let mut seen_fingerprints = HashSet::new();
    let exact: Vec<EvidenceClaim> = claims
        .into_iter()
        .filter(|c| seen_fingerprints.insert(c.fingerprint.clone()))
        .collect();
    let after_exact = exact.len();

    let mut accepted_by_url: HashMap<String, Vec<HashSet<String>>> = HashMap::new();
    let mut survivors = Vec::with_capacity(exact.len());
    for claim in exact {
        let tokens = word_tokens(&claim.claim_text);
        let accepted = accepted_by_url.entry(claim.canonical_url.clone()).or_default();

        let is_near_duplicate = accepted
            .iter()
            .any(|other| jaccard(&tokens, other) > config.similarity_threshold);
        if is_near_duplicate {
            continue;
        }

        accepted.push(tokens);
        survivors.push(claim);
    }

    debug!(
        input,
        exact_removed = input - after_exact,
        near_removed = after_exact - survivors.len(),
        "claims deduplicated"
    );
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::claim;
    use crate::types::category::EvidenceCategory;
    use proptest::prelude::*;

    /// Two texts with exactly `shared` common tokens out of `total` in the union.
    fn texts_with_similarity(shared: usize, total: usize) -> (String, String) {
        let common: Vec<String> = (0..shared).map(|i| format!("w{}", i)).collect();
        let mut a = common.clone();
        let mut b = common;
        for i in shared..total {
            if (i - shared) % 2 == 0 {
                a.push(format!("x{}", i));
            } else {
                b.push(format!("y{}", i));
            }
        }
        (a.join(" "), b.join(" "))
    }

    #[test]
    fn test_jaccard_basics() {
        assert_eq!(text_similarity("Pro plan", "pro PLAN"), 1.0);
        assert_eq!(text_similarity("a b", "c d"), 0.0);
        assert!((text_similarity("a b c", "a b d") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let first = claim("Pro plan $49", "https://acme.com/pricing", EvidenceCategory::Pricing);
        let mut second = first.clone();
        second.id = "other".into();

        let out = dedup_claims(vec![first.clone(), second], &DedupConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, first.id);
    }

    #[test]
    fn test_threshold_is_strict() {
        // 17 shared of 20 total = 0.85
        let (a, b) = texts_with_similarity(17, 20);
        assert!((text_similarity(&a, &b) - 0.85).abs() < 1e-12);
        let claims = vec![
            claim(&a, "https://acme.com/docs", EvidenceCategory::Docs),
            claim(&b, "https://acme.com/docs", EvidenceCategory::Docs),
        ];
        assert_eq!(dedup_claims(claims, &DedupConfig::default()).len(), 2);

        // 43 shared of 50 total = 0.86
        let (a, b) = texts_with_similarity(43, 50);
        assert!((text_similarity(&a, &b) - 0.86).abs() < 1e-12);
        let claims = vec![
            claim(&a, "https://acme.com/docs", EvidenceCategory::Docs),
            claim(&b, "https://acme.com/docs", EvidenceCategory::Docs),
        ];
        let out = dedup_claims(claims, &DedupConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].claim_text, a);
    }

    #[test]
    fn test_near_duplicates_on_different_urls_are_kept() {
        let claims = vec![
            claim("Pro plan costs $49 per user", "https://acme.com/pricing", EvidenceCategory::Pricing),
            claim("Pro plan costs $49 per user", "https://g2.com/acme", EvidenceCategory::Pricing),
        ];
        assert_eq!(dedup_claims(claims, &DedupConfig::default()).len(), 2);
    }

    #[test]
    fn test_preserves_order() {
        let claims = vec![
            claim("zeta", "https://a.com", EvidenceCategory::Blog),
            claim("alpha", "https://b.com", EvidenceCategory::Blog),
            claim("mid", "https://c.com", EvidenceCategory::Blog),
        ];
        let out = dedup_claims(claims, &DedupConfig::default());
        let texts: Vec<_> = out.iter().map(|c| c.claim_text.as_str()).collect();
        assert_eq!(texts, vec!["zeta", "alpha", "mid"]);
    }

    proptest! {
        #[test]
        fn prop_dedup_is_idempotent(
            items in prop::collection::vec(
                (prop::sample::select(vec!["pro plan", "pro plan monthly", "sso included", "api limits"]),
                 prop::sample::select(vec!["https://acme.com/a", "https://acme.com/b"])),
                0..12,
            )
        ) {
            let claims: Vec<_> = items
                .iter()
                .map(|(text, url)| claim(text, url, EvidenceCategory::Pricing))
                .collect();
            let once = dedup_claims(claims, &DedupConfig::default());
            let twice = dedup_claims(once.clone(), &DedupConfig::default());
            prop_assert_eq!(once, twice);
        }
    }
}
