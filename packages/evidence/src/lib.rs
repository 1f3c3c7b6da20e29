//! Competitor Evidence Pipeline
//!
//! Collects public web evidence about a competitor, turns raw search hits
//! into deduplicated, ranked claims grouped by category, and computes a
//! deterministic coverage score and confidence label that gates downstream
//! analysis.
//!
//! # Flows
//!
//! - **Harvest**: query packs -> search -> per-category dedup -> immutable
//!   [`EvidenceBundle`] appended to an [`ArtifactStore`]
//! - **Assess**: bundle -> claims -> dedup -> rank -> [`CoverageModel`]
//! - **Deep harvest**: parallel fetch (cached) -> Pass A triage ->
//!   quota shortlist -> Pass B deep read, only on the shortlist
//!
//! # Usage
//!
//! ```rust,ignore
//! use evidence::{harvest_and_store, latest_assessment, HarvestContext, MemoryStore, PipelineConfig};
//! use evidence::traits::searcher::MockWebSearcher;
//!
//! let store = MemoryStore::new();
//! let searcher = MockWebSearcher::new();
//! let ctx = HarvestContext::new("Acme").with_domain("acme.com");
//! let config = PipelineConfig::default();
//!
//! harvest_and_store("project-1", &ctx, &searcher, &store, &config, Utc::now()).await?;
//! let assessment = latest_assessment("project-1", &store, &["acme.com".into()], &config, Utc::now()).await?;
//! println!("{}", assessment.coverage.confidence_label);
//! ```
//!
//! # Modules
//!
//! - [`types`] - bundles, claims, cache entries, summaries, configuration
//! - [`traits`] - search, extraction, summarization, deep read, storage
//! - [`pipeline`] - every stage plus orchestration
//! - [`stores`] - storage backends (memory, SQLite)
//! - [`testing`] - mock implementations and fixtures

pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{EvidenceError, FetchFailure, Result};
pub use security::SecretString;
pub use traits::{
    deep_reader::{DeepFinding, DeepReader},
    extractor::{ContentExtractor, HttpExtractor},
    searcher::{MockWebSearcher, SearchResult, TavilyWebSearcher, WebSearcher},
    store::{ArtifactStore, EvidenceCache, StoredArtifact},
    summarizer::{OpenAiSummarizer, Summarizer},
};
pub use types::{
    bundle::{BundleSource, CategoryGroup, EvidenceBundle, HarvestStats, SourceType},
    category::EvidenceCategory,
    claim::{ClaimConfidence, EvidenceClaim, EvidenceRow},
    config::{
        CategoryQuota, CoverageConfig, DedupConfig, DeepReadConfig, FetchConfig, GapMode,
        HarvestConfig, MvcRule, PipelineConfig, QueryPackConfig, RankConfig, ShortlistConfig,
        TriageConfig,
    },
    page::{CacheEntry, ExtractedContent, FetchedPage},
    summary::{CredibilityHint, PageSummary, RecencyHint},
};

// Re-export pipeline components
pub use pipeline::{
    // Orchestration
    assess_bundle, assess_claims, harvest_and_store, latest_assessment, Assessment,
    DeepHarvest, DeepHarvestReport,
    // Stages
    build_query_packs, canonicalize_url, claims_from_bundle, claims_from_rows, dedup_claims,
    extract_domain, fetch_all, harvest, rank_claims, score_coverage, select_shortlist,
    triage_pages,
    // Stage outputs
    ConfidenceLabel, CoverageModel, FetchRecord, FetchReport, FetchStats, Gap, HarvestContext,
    ShortlistEntry, TriageRecord, TriageReport,
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;
