//! Storage traits for the page cache and the artifact store.
//!
//! - `EvidenceCache`: content-addressed page cache keyed by normalized URL
//! - `ArtifactStore`: append-only, project-scoped JSON blobs (evidence bundles)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{bundle::EvidenceBundle, page::CacheEntry, summary::PageSummary};

/// Artifact kind under which evidence bundles are stored.
pub const EVIDENCE_BUNDLE_KIND: &str = "evidence_bundle";

/// Page cache keyed by normalized URL.
///
/// Writes are atomic upserts at the storage layer (last write wins), so
/// concurrent fetches of the same URL need no application-level locking.
#[async_trait]
pub trait EvidenceCache: Send + Sync {
    /// Get the entry for a normalized URL, fresh or not.
    async fn get_entry(&self, normalized_url: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry for `entry.normalized_url`.
    ///
    /// When the stored content hash equals the new one and the new entry
    /// carries no summary, the stored summary is kept.
    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<()>;

    /// Attach a triage summary, but only if the stored content hash still
    /// matches. Returns whether a row was updated.
    async fn attach_summary(
        &self,
        normalized_url: &str,
        content_hash: &str,
        summary: &PageSummary,
        version: &str,
    ) -> Result<bool>;

    /// Number of cached entries.
    async fn count_entries(&self) -> Result<usize>;
}

/// Metadata about a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub id: String,
    pub project_id: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only, project-scoped artifact store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Append a new evidence bundle for a project.
    async fn put_bundle(&self, project_id: &str, bundle: &EvidenceBundle) -> Result<StoredArtifact>;

    /// The most recently created evidence bundle for a project.
    async fn latest_bundle(&self, project_id: &str) -> Result<Option<EvidenceBundle>>;
}
