//! Coverage and confidence scoring over a claim set.
//!
//! A pure function of the claims, the competitor domains, the config and
//! `now`: the same inputs always yield the same model. Gates downstream
//! analysis through [`ConfidenceLabel`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::pipeline::rank::is_first_party;
use crate::types::{
    category::EvidenceCategory,
    claim::EvidenceClaim,
    config::{CoverageConfig, GapMode, MvcRule},
};

/// Gating label for downstream generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    Insufficient,
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Insufficient => "Insufficient",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(label)
    }
}

/// A missing category and how to fill it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub category: EvidenceCategory,
    /// Part of minimum viable coverage
    pub required: bool,
    pub message: String,
    pub suggestion: String,
}

/// Derived view of a claim set. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageModel {
    /// Every claim category, zero counts included
    pub counts_by_category: BTreeMap<EvidenceCategory, usize>,
    pub categories_present: Vec<EvidenceCategory>,
    pub total_claims: usize,
    pub first_party_ratio: f64,
    pub recency_score: f64,
    pub coverage_score: f64,
    pub mvc_met: bool,
    pub confidence_label: ConfidenceLabel,
    pub gaps: Vec<Gap>,
}

impl MvcRule {
    /// Categories minimum viable coverage is judged on, in gap order.
    pub fn core_categories(&self) -> &'static [EvidenceCategory] {
        use EvidenceCategory::*;
        match self {
            MvcRule::CoreTriad => &[Pricing, Docs, Reviews],
            MvcRule::ThreeOfFive => &[Pricing, Reviews, Changelog, Jobs, Docs],
        }
    }

    /// Categories that raise the score once MVC is met.
    pub fn secondary_categories(&self) -> &'static [EvidenceCategory] {
        use EvidenceCategory::*;
        match self {
            MvcRule::CoreTriad => &[Jobs, Changelog, Blog, Community, Security],
            MvcRule::ThreeOfFive => &[Security, Community, Blog],
        }
    }

    /// Progress toward MVC in `[0, 3]` core categories; MVC is met at 3.
    fn progress(&self, present: &[EvidenceCategory]) -> usize {
        let has = |c: &EvidenceCategory| present.contains(c);
        let core = self.core_categories().iter().filter(|c| has(c)).count();
        match self {
            MvcRule::CoreTriad => core,
            MvcRule::ThreeOfFive => {
                let anchored = has(&EvidenceCategory::Pricing) || has(&EvidenceCategory::Reviews);
                core.min(if anchored { 3 } else { 2 })
            }
        }
    }
}

const MVC_TARGET: usize = 3;

fn suggestion(category: EvidenceCategory) -> &'static str {
    match category {
        EvidenceCategory::Pricing => "Find the pricing page or a third-party pricing breakdown",
        EvidenceCategory::Docs => "Find product documentation, API reference or help center articles",
        EvidenceCategory::Reviews => "Find reviews on G2, Capterra or TrustRadius",
        EvidenceCategory::Changelog | EvidenceCategory::Status => {
            "Find the changelog, release notes or status page"
        }
        EvidenceCategory::Jobs => "Find the careers page or current job listings",
        EvidenceCategory::Security => "Find the security, trust or compliance page",
        EvidenceCategory::Community => "Find forum, Reddit or community discussions",
        EvidenceCategory::Blog => "Find recent blog posts or product announcements",
        EvidenceCategory::Other => "Run a broader search for the company",
    }
}

fn gap(category: EvidenceCategory, required: bool) -> Gap {
    let message = if required {
        format!("Missing {} evidence (required for minimum coverage)", category)
    } else {
        format!("No {} evidence found", category)
    };
    Gap {
        category,
        required,
        message,
        suggestion: suggestion(category).to_string(),
    }
}

fn recency_score(claims: &[EvidenceClaim], now: DateTime<Utc>) -> f64 {
    if claims.is_empty() {
        return 0.0;
    }
    let Some(latest) = claims.iter().filter_map(EvidenceClaim::effective_date).max() else {
        return 0.3;
    };
    match (now - latest).num_days() {
        i64::MIN..=30 => 1.0,
        31..=90 => 0.7,
        91..=180 => 0.4,
        _ => 0.1,
    }
}

fn confidence_label(
    total_claims: usize,
    mvc_met: bool,
    coverage_score: f64,
    recency_score: f64,
    first_party_ratio: f64,
) -> ConfidenceLabel {
    if total_claims == 0 || !mvc_met {
        ConfidenceLabel::Insufficient
    } else if recency_score >= 0.7 && first_party_ratio >= 0.5 {
        ConfidenceLabel::High
    } else if coverage_score >= 0.6 || (recency_score >= 0.5 && first_party_ratio >= 0.3) {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

/// Score coverage and confidence for a claim set.
pub fn score_coverage(
    claims: &[EvidenceClaim],
    competitor_domains: &[String],
    config: &CoverageConfig,
    now: DateTime<Utc>,
) -> CoverageModel {
    let mut counts_by_category: BTreeMap<EvidenceCategory, usize> = EvidenceCategory::CLAIM_CATEGORIES
        .into_iter()
        .map(|c| (c, 0))
        .collect();
    for claim in claims {
        *counts_by_category
            .entry(claim.category.claim_category())
            .or_insert(0) += 1;
    }
    let categories_present: Vec<EvidenceCategory> = counts_by_category
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(category, _)| *category)
        .collect();

    let total_claims = claims.len();
    let first_party = claims
        .iter()
        .filter(|c| is_first_party(&c.domain, competitor_domains))
        .count();
    let first_party_ratio = if total_claims == 0 {
        0.0
    } else {
        first_party as f64 / total_claims as f64
    };
    let recency_score = recency_score(claims, now);

    let rule = config.mvc_rule;
    let progress = rule.progress(&categories_present);
    let mvc_met = progress >= MVC_TARGET;

    let coverage_score = if mvc_met {
        let secondary = rule.secondary_categories();
        let secondary_present = secondary
            .iter()
            .filter(|c| categories_present.contains(c))
            .count();
        let density = total_claims as f64 / categories_present.len() as f64;
        let boost = if density >= config.density_threshold {
            config.density_boost
        } else {
            0.0
        };
        (0.6 + 0.4 * secondary_present as f64 / secondary.len() as f64 + boost).min(1.0)
    } else {
        progress as f64 / MVC_TARGET as f64 * 0.4
    };

    let mut gaps: Vec<Gap> = Vec::new();
    if !mvc_met {
        gaps.extend(
            rule.core_categories()
                .iter()
                .filter(|c| !categories_present.contains(c))
                .map(|c| gap(*c, true)),
        );
    }
    gaps.extend(
        rule.secondary_categories()
            .iter()
            .filter(|c| !categories_present.contains(c))
            .map(|c| gap(*c, false)),
    );
    if let GapMode::Capped(max) = config.gap_mode {
        gaps.truncate(max);
    }

    CoverageModel {
        confidence_label: confidence_label(
            total_claims,
            mvc_met,
            coverage_score,
            recency_score,
            first_party_ratio,
        ),
        counts_by_category,
        categories_present,
        total_claims,
        first_party_ratio,
        recency_score,
        coverage_score,
        mvc_met,
        gaps,
    }
}
