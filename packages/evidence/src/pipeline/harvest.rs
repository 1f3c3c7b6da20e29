//! Harvester - run query packs against the searcher and build a bundle.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::pipeline::normalize::{
    canonicalize_url, collapse_whitespace, extract_domain, is_same_or_subdomain, normalize_excerpt,
    parse_published_date,
};
use crate::pipeline::queries::{build_query_packs, HarvestContext, QueryPack};
use crate::traits::searcher::{SearchResult, WebSearcher};
use crate::types::{
    bundle::{
        BundleMeta, BundleSource, BundleTotals, CategoryGroup, EvidenceBundle, HarvestStats,
        SourceType, BUNDLE_SCHEMA_VERSION,
    },
    config::PipelineConfig,
};

/// Hosts whose content is user-generated discussion.
const COMMUNITY_HOSTS: &[&str] = &[
    "reddit.com",
    "news.ycombinator.com",
    "stackoverflow.com",
    "stackexchange.com",
    "quora.com",
    "discord.com",
    "twitter.com",
    "x.com",
    "dev.to",
];

fn classify_source(domain: &str, preferred_domain: Option<&str>) -> SourceType {
    if let Some(preferred) = preferred_domain {
        if is_same_or_subdomain(domain, preferred) {
            return SourceType::Official;
        }
    }
    let community = COMMUNITY_HOSTS
        .iter()
        .any(|host| is_same_or_subdomain(domain, host))
        || domain.starts_with("community.")
        || domain.starts_with("forum.");
    if community {
        SourceType::Community
    } else {
        SourceType::ThirdParty
    }
}

/// Normalize one raw hit. Hits whose URL cannot be canonicalized are dropped.
fn normalize_result(
    result: &SearchResult,
    preferred_domain: Option<&str>,
    excerpt_max_chars: usize,
) -> Option<BundleSource> {
    let url = canonicalize_url(&result.url)?;
    let domain = extract_domain(&url);

    let title = result
        .title
        .as_deref()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| domain.clone());

    let snippet = result
        .content
        .as_deref()
        .map(|c| normalize_excerpt(c, excerpt_max_chars))
        .filter(|s| !s.is_empty());

    Some(BundleSource {
        title,
        source_type: classify_source(&domain, preferred_domain),
        url,
        domain,
        published_date: result.published_date.as_deref().and_then(parse_published_date),
        snippet,
    })
}

/// Dedup by canonical URL; the first occurrence wins.
///
/// The domain is derived from the canonical URL, so duplicates always share
/// a domain and a preferred-domain hint can never split them.
fn dedup_sources(sources: Vec<BundleSource>) -> IndexMap<String, BundleSource> {
    let mut unique: IndexMap<String, BundleSource> = IndexMap::new();
    for source in sources {
        unique.entry(source.url.clone()).or_insert(source);
    }
    unique
}

/// Run one search call; failures degrade to an empty result set.
async fn run_query<S: WebSearcher>(
    searcher: &S,
    semaphore: &Semaphore,
    query: &str,
    limit: usize,
) -> Vec<SearchResult> {
    let _permit = semaphore.acquire().await.ok();
    match searcher.search_with_limit(query, limit).await {
        Ok(results) => {
            debug!(query = %query, results = results.len(), "search returned");
            results
        }
        Err(e) => {
            warn!(query = %query, error = %e, "search failed; continuing with no results");
            Vec::new()
        }
    }
}

/// Harvest evidence for a competitor into a new, immutable bundle.
///
/// Never fails: a query that errors contributes no results.
pub async fn harvest<S: WebSearcher>(
    ctx: &HarvestContext,
    searcher: &S,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> EvidenceBundle {
    let packs: Vec<QueryPack> = build_query_packs(ctx, &config.queries);
    let limit = ctx
        .limit_per_category
        .unwrap_or(config.harvest.limit_per_category);
    let hint = config.harvest.per_query_hint(limit);
    let preferred_domain = ctx.domain();
    let preferred = preferred_domain.as_deref();

    info!(
        company = %ctx.company_name,
        categories = packs.len(),
        queries = packs.iter().map(|p| p.queries.len()).sum::<usize>(),
        "harvest starting"
    );

    let semaphore = Arc::new(Semaphore::new(config.harvest.concurrency.max(1)));
    let pack_futures = packs.iter().map(|pack| {
        let semaphore = semaphore.clone();
        async move {
            let per_query = join_all(
                pack.queries
                    .iter()
                    .map(|q| run_query(searcher, &semaphore, q, hint)),
            )
            .await;
            (pack, per_query)
        }
    });
    let results = join_all(pack_futures).await;

    let mut groups = Vec::with_capacity(results.len());
    for (pack, per_query) in results {
        let raw: Vec<SearchResult> = per_query.into_iter().flatten().collect();
        let returned = raw.len();
        let normalized: Vec<BundleSource> = raw
            .iter()
            .filter_map(|r| normalize_result(r, preferred, config.harvest.excerpt_max_chars))
            .collect();
        let valid = normalized.len();

        let unique = dedup_sources(normalized);
        let deduped = valid - unique.len();
        let sources: Vec<BundleSource> = unique.into_values().take(limit).collect();
        let unique_domains = sources
            .iter()
            .map(|s| s.domain.as_str())
            .collect::<HashSet<_>>()
            .len();

        let stats = HarvestStats {
            requested: pack.queries.len() * hint,
            returned,
            kept: sources.len(),
            deduped,
            unique_domains,
        };
        debug!(category = %pack.category, ?stats, "category harvested");

        groups.push(CategoryGroup {
            category: pack.category,
            queries: pack.queries.clone(),
            sources,
            stats,
        });
    }

    let totals = compute_totals(&groups);
    info!(
        sources = totals.sources,
        unique_urls = totals.unique_urls,
        unique_domains = totals.unique_domains,
        "harvest complete"
    );

    EvidenceBundle {
        schema_version: BUNDLE_SCHEMA_VERSION,
        meta: BundleMeta {
            company: collapse_whitespace(&ctx.company_name),
            url: ctx.primary_domain.clone(),
            context: ctx.context.clone(),
            harvested_at: now,
            limit_per_category: limit,
        },
        groups,
        totals,
    }
}

fn compute_totals(groups: &[CategoryGroup]) -> BundleTotals {
    let mut urls = HashSet::new();
    let mut domains = HashSet::new();
    let mut by_category = BTreeMap::new();
    let mut sources = 0;

    for group in groups {
        sources += group.sources.len();
        *by_category.entry(group.category).or_insert(0) += group.sources.len();
        for s in &group.sources {
            urls.insert(s.url.as_str());
            domains.insert(s.domain.as_str());
        }
    }

    BundleTotals {
        sources,
        unique_urls: urls.len(),
        unique_domains: domains.len(),
        by_category,
    }
}
