//! Query pack builder - deterministic search queries per category.
//!
//! Identical context always yields identical queries, in the same order,
//! so re-harvests are reproducible and cache-friendly.

use serde::{Deserialize, Serialize};

use crate::pipeline::normalize::{collapse_whitespace, extract_domain, normalize_excerpt, ELLIPSIS};
use crate::types::{category::EvidenceCategory, config::QueryPackConfig};

/// What we know about the competitor before harvesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestContext {
    pub company_name: String,

    /// Competitor's own domain (or a URL on it)
    pub primary_domain: Option<String>,

    /// Free-text qualifier ("project management for agencies")
    pub context: Option<String>,

    /// Restrict harvesting to these categories; `None` means all
    pub categories: Option<Vec<EvidenceCategory>>,

    /// Overrides the configured per-category source limit
    pub limit_per_category: Option<usize>,
}

impl HarvestContext {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            primary_domain: None,
            context: None,
            categories: None,
            limit_per_category: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.primary_domain = Some(domain.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = EvidenceCategory>) -> Self {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn with_limit_per_category(mut self, limit: usize) -> Self {
        self.limit_per_category = Some(limit);
        self
    }

    /// Normalized competitor domain, if one was given.
    pub fn domain(&self) -> Option<String> {
        self.primary_domain
            .as_deref()
            .map(extract_domain)
            .filter(|d| !d.is_empty())
    }

    /// Requested categories, deduplicated, in canonical order.
    pub fn resolved_categories(&self) -> Vec<EvidenceCategory> {
        match &self.categories {
            Some(subset) => EvidenceCategory::ALL
                .into_iter()
                .filter(|c| subset.contains(c))
                .collect(),
            None => EvidenceCategory::ALL.to_vec(),
        }
    }
}

/// Ordered queries for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPack {
    pub category: EvidenceCategory,
    pub queries: Vec<String>,
}

/// Search keywords per category, most specific first.
fn keywords(category: EvidenceCategory) -> &'static [&'static str] {
    match category {
        EvidenceCategory::Pricing => &["pricing", "plans and pricing", "cost per user"],
        EvidenceCategory::Docs => &["documentation", "api reference", "developer guide"],
        EvidenceCategory::Changelog => &["changelog", "release notes", "what's new"],
        EvidenceCategory::Status => &["status page", "outage incident"],
        EvidenceCategory::Reviews => &["reviews", "g2 reviews", "capterra reviews"],
        EvidenceCategory::Jobs => &["careers", "jobs hiring"],
        EvidenceCategory::Security => &["security", "soc 2 compliance", "trust center"],
        EvidenceCategory::Community => &["community forum", "reddit", "discord community"],
        EvidenceCategory::Blog => &["blog", "product announcement"],
        EvidenceCategory::Other => &["overview", "alternatives"],
    }
}

fn company_term(company: &str) -> String {
    let company = collapse_whitespace(company);
    if company.contains(' ') {
        format!("\"{}\"", company)
    } else {
        company
    }
}

/// Build the query pack for one category.
pub fn build_category_queries(
    ctx: &HarvestContext,
    category: EvidenceCategory,
    config: &QueryPackConfig,
) -> QueryPack {
    let company = company_term(&ctx.company_name);
    let qualifier = ctx
        .context
        .as_deref()
        .map(|c| normalize_excerpt(c, config.context_max_chars))
        .map(|c| c.trim_end_matches(ELLIPSIS).to_string())
        .filter(|c| !c.is_empty());
    let domain = ctx.domain();
    let kws = keywords(category);

    let mut candidates: Vec<String> = Vec::new();
    candidates.push(format!("{} {}", company, kws[0]));
    if let Some(q) = &qualifier {
        candidates.push(format!("{} {} {}", company, kws[0], q));
    }
    if let (Some(domain), true) = (&domain, category.has_first_party_source()) {
        candidates.push(format!("site:{} {}", domain, kws[0]));
    }
    for kw in &kws[1..] {
        candidates.push(format!("{} {}", company, kw));
    }

    let mut queries: Vec<String> = Vec::new();
    for q in candidates {
        if !queries.contains(&q) {
            queries.push(q);
        }
    }
    queries.truncate(config.max_queries_per_category.max(1));

    QueryPack { category, queries }
}

/// Build query packs for every requested category, in canonical order.
pub fn build_query_packs(ctx: &HarvestContext, config: &QueryPackConfig) -> Vec<QueryPack> {
    ctx.resolved_categories()
        .into_iter()
        .map(|category| build_category_queries(ctx, category, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packs_are_deterministic() {
        let ctx = HarvestContext::new("Acme")
            .with_domain("https://www.acme.com/")
            .with_context("project management for agencies");
        let config = QueryPackConfig::default();

        let first = build_query_packs(&ctx, &config);
        let second = build_query_packs(&ctx, &config);
        assert_eq!(first, second);
        assert_eq!(first.len(), EvidenceCategory::ALL.len());
    }

    #[test]
    fn test_domain_scoped_variant() {
        let ctx = HarvestContext::new("Acme").with_domain("www.acme.com");
        let pack = build_category_queries(&ctx, EvidenceCategory::Pricing, &QueryPackConfig::default());

        assert_eq!(pack.queries[0], "Acme pricing");
        assert!(pack.queries.contains(&"site:acme.com pricing".to_string()));
    }

    #[test]
    fn test_no_domain_variant_for_reviews() {
        let ctx = HarvestContext::new("Acme").with_domain("acme.com");
        let pack = build_category_queries(&ctx, EvidenceCategory::Reviews, &QueryPackConfig::default());
        assert!(pack.queries.iter().all(|q| !q.starts_with("site:")));
    }

    #[test]
    fn test_multiword_company_is_quoted_and_capped() {
        let ctx = HarvestContext::new("Acme   Corp").with_context("CRM");
        let config = QueryPackConfig {
            max_queries_per_category: 2,
            ..Default::default()
        };
        let pack = build_category_queries(&ctx, EvidenceCategory::Docs, &config);

        assert_eq!(
            pack.queries,
            vec![
                "\"Acme Corp\" documentation".to_string(),
                "\"Acme Corp\" documentation CRM".to_string()
            ]
        );
    }

    #[test]
    fn test_category_subset_in_canonical_order() {
        let ctx = HarvestContext::new("Acme").with_categories([
            EvidenceCategory::Reviews,
            EvidenceCategory::Pricing,
            EvidenceCategory::Reviews,
        ]);
        let packs = build_query_packs(&ctx, &QueryPackConfig::default());
        let cats: Vec<_> = packs.iter().map(|p| p.category).collect();
        assert_eq!(cats, vec![EvidenceCategory::Pricing, EvidenceCategory::Reviews]);
    }
}
