//! Evidence pipeline stages and their orchestration.
//!
//! Harvest path: queries -> harvest -> (stored bundle) -> claims -> dedup
//! -> rank -> coverage. Deep path: fetch -> triage -> shortlist -> deep read.

pub mod claims;
pub mod coverage;
pub mod dedup;
pub mod deep_read;
pub mod fetch;
pub mod harvest;
pub mod normalize;
pub mod prompts;
pub mod queries;
pub mod rank;
pub mod triage;

pub use claims::{claims_from_bundle, claims_from_findings, claims_from_rows, fingerprint};
pub use coverage::{score_coverage, ConfidenceLabel, CoverageModel, Gap};
pub use dedup::dedup_claims;
pub use deep_read::{deep_read_shortlist, DeepHarvest, DeepHarvestReport, DeepReadRecord};
pub use fetch::{fetch_all, FetchRecord, FetchReport, FetchStats};
pub use harvest::harvest;
pub use normalize::{canonicalize_url, extract_domain};
pub use queries::{build_query_packs, HarvestContext, QueryPack};
pub use rank::rank_claims;
pub use triage::{
    select_shortlist, triage_pages, ShortlistEntry, ShortlistReason, TriageRecord, TriageReport,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::traits::{searcher::WebSearcher, store::ArtifactStore, store::StoredArtifact};
use crate::types::{bundle::EvidenceBundle, claim::EvidenceClaim, config::PipelineConfig};

/// Ranked claims and the coverage computed from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub claims: Vec<EvidenceClaim>,
    pub coverage: CoverageModel,
}

/// Dedup, rank and score an already-loaded claim set.
pub fn assess_claims(
    claims: Vec<EvidenceClaim>,
    competitor_domains: &[String],
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Assessment {
    let claims = dedup_claims(claims, &config.dedup);
    let claims = rank_claims(claims, competitor_domains, &config.rank, now);
    let coverage = score_coverage(&claims, competitor_domains, &config.coverage, now);
    Assessment { claims, coverage }
}

/// Load, dedup, rank and score the claims of a bundle.
pub fn assess_bundle(
    bundle: &EvidenceBundle,
    competitor_domains: &[String],
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Assessment {
    assess_claims(claims_from_bundle(bundle), competitor_domains, config, now)
}

/// Harvest and append the new bundle to the project's artifacts.
pub async fn harvest_and_store<S, A>(
    project_id: &str,
    ctx: &HarvestContext,
    searcher: &S,
    store: &A,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<(EvidenceBundle, StoredArtifact)>
where
    S: WebSearcher,
    A: ArtifactStore,
{
    let bundle = harvest(ctx, searcher, config, now).await;
    let artifact = store.put_bundle(project_id, &bundle).await?;
    info!(
        project_id = %project_id,
        artifact_id = %artifact.id,
        sources = bundle.totals.sources,
        "evidence bundle stored"
    );
    Ok((bundle, artifact))
}

/// Assess the project's most recent bundle. Without one, the assessment
/// is empty and `Insufficient`.
pub async fn latest_assessment<A: ArtifactStore>(
    project_id: &str,
    store: &A,
    competitor_domains: &[String],
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<Assessment> {
    let assessment = match store.latest_bundle(project_id).await? {
        Some(bundle) => assess_bundle(&bundle, competitor_domains, config, now),
        None => {
            info!(project_id = %project_id, "no evidence bundle yet");
            assess_claims(Vec::new(), competitor_domains, config, now)
        }
    };
    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::traits::searcher::{MockWebSearcher, SearchResult};

    #[tokio::test]
    async fn test_latest_assessment_without_bundle() {
        let store = MemoryStore::new();
        let assessment = latest_assessment("p1", &store, &[], &PipelineConfig::default(), Utc::now())
            .await
            .unwrap();

        assert!(assessment.claims.is_empty());
        assert_eq!(assessment.coverage.confidence_label, ConfidenceLabel::Insufficient);
        assert!(!assessment.coverage.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_then_assess_roundtrip() {
        let searcher = MockWebSearcher::new().with_results(
            "Acme pricing",
            vec![SearchResult::new("https://acme.com/pricing")
                .with_title("Acme Pricing")
                .with_content("Pro plan is $49 per user per month")],
        );
        let store = MemoryStore::new();
        let ctx = HarvestContext::new("Acme").with_domain("acme.com");
        let config = PipelineConfig::default();
        let now = Utc::now();

        let (bundle, _) = harvest_and_store("p1", &ctx, &searcher, &store, &config, now)
            .await
            .unwrap();
        let domains = vec!["acme.com".to_string()];
        let latest = latest_assessment("p1", &store, &domains, &config, now).await.unwrap();

        assert_eq!(latest, assess_bundle(&bundle, &domains, &config, now));
        assert_eq!(latest.claims.len(), 1);
        assert_eq!(latest.coverage.first_party_ratio, 1.0);
    }
}
