//! Claim ranking - per-claim deterministic score and a total order.
//!
//! `score = (0.5 + 0.5 * recency) * first_party * category_weight * confidence_weight`

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::pipeline::normalize::is_same_or_subdomain;
use crate::types::{
    category::EvidenceCategory,
    claim::{ClaimConfidence, EvidenceClaim},
    config::RankConfig,
};

/// Fixed per-category weight. Status claims are filed as changelog and
/// weigh the same.
pub fn category_weight(category: EvidenceCategory) -> f64 {
    match category {
        EvidenceCategory::Status => category_weight(category.claim_category()),
        EvidenceCategory::Pricing | EvidenceCategory::Docs | EvidenceCategory::Changelog => 1.0,
        EvidenceCategory::Security => 0.9,
        EvidenceCategory::Reviews | EvidenceCategory::Jobs => 0.8,
        EvidenceCategory::Community => 0.6,
        EvidenceCategory::Blog => 0.5,
        EvidenceCategory::Other => 0.3,
    }
}

/// Weight of the producer's confidence; unset counts as full confidence.
pub fn confidence_weight(confidence: Option<ClaimConfidence>) -> f64 {
    match confidence {
        Some(ClaimConfidence::Low) => 0.5,
        Some(ClaimConfidence::Med) => 0.75,
        Some(ClaimConfidence::High) | None => 1.0,
    }
}

/// Recency bonus by age in days.
pub fn recency_bonus(date: Option<DateTime<Utc>>, now: DateTime<Utc>, config: &RankConfig) -> f64 {
    let Some(date) = date else {
        return config.undated_recency_bonus;
    };
    match (now - date).num_days() {
        i64::MIN..=30 => 1.0,
        31..=90 => 0.8,
        91..=180 => 0.6,
        _ => 0.4,
    }
}

/// Whether a claim's domain belongs to any competitor domain.
pub fn is_first_party(domain: &str, competitor_domains: &[String]) -> bool {
    competitor_domains
        .iter()
        .any(|parent| is_same_or_subdomain(domain, parent))
}

/// Score one claim. Independent of every other claim.
pub fn score_claim(
    claim: &EvidenceClaim,
    competitor_domains: &[String],
    config: &RankConfig,
    now: DateTime<Utc>,
) -> f64 {
    let recency = recency_bonus(claim.effective_date(), now, config);
    let first_party = if is_first_party(&claim.domain, competitor_domains) {
        config.first_party_multiplier
    } else {
        1.0
    };

    (0.5 + 0.5 * recency)
        * first_party
        * category_weight(claim.category)
        * confidence_weight(claim.confidence)
}

/// Total order over scored claims: score descending, then most recent
/// `retrieved_at`, then most recent `published_at`, then claim text, then
/// canonical URL and fingerprint.
pub fn compare_ranked(a: &EvidenceClaim, b: &EvidenceClaim) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.retrieved_at.cmp(&a.retrieved_at))
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.claim_text.cmp(&b.claim_text))
        .then_with(|| a.canonical_url.cmp(&b.canonical_url))
        .then_with(|| a.fingerprint.cmp(&b.fingerprint))
}

/// Score every claim and sort into the ranked order.
pub fn rank_claims(
    mut claims: Vec<EvidenceClaim>,
    competitor_domains: &[String],
    config: &RankConfig,
    now: DateTime<Utc>,
) -> Vec<EvidenceClaim> {
    for claim in &mut claims {
        claim.score = score_claim(claim, competitor_domains, config, now);
    }
    claims.sort_by(compare_ranked);
    claims
}
