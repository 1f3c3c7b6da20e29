//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{EvidenceError, Result};
use crate::traits::store::{ArtifactStore, EvidenceCache, StoredArtifact, EVIDENCE_BUNDLE_KIND};
use crate::types::{bundle::EvidenceBundle, page::CacheEntry, summary::PageSummary};

/// In-memory page cache and artifact store.
///
/// Each write happens under a single lock acquisition, which makes the
/// upsert atomic. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    artifacts: RwLock<Vec<(StoredArtifact, serde_json::Value)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts across all projects.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> EvidenceError {
    EvidenceError::storage("memory store lock poisoned")
}

#[async_trait]
impl EvidenceCache for MemoryStore {
    async fn get_entry(&self, normalized_url: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().map_err(poisoned)?.get(normalized_url).cloned())
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let mut next = entry.clone();

        if next.summary.is_none() {
            if let Some(existing) = entries.get(&entry.normalized_url) {
                if existing.content_hash == next.content_hash {
                    next.summary = existing.summary.clone();
                    next.summary_version = existing.summary_version.clone();
                }
            }
        }

        entries.insert(next.normalized_url.clone(), next);
        Ok(())
    }

    async fn attach_summary(
        &self,
        normalized_url: &str,
        content_hash: &str,
        summary: &PageSummary,
        version: &str,
    ) -> Result<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.get_mut(normalized_url) {
            Some(entry) if entry.content_hash == content_hash => {
                entry.summary = Some(summary.clone());
                entry.summary_version = Some(version.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_entries(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put_bundle(&self, project_id: &str, bundle: &EvidenceBundle) -> Result<StoredArtifact> {
        let payload = serde_json::to_value(bundle)?;
        let artifact = StoredArtifact {
            id: Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            kind: EVIDENCE_BUNDLE_KIND.to_string(),
            created_at: Utc::now(),
        };

        self.artifacts
            .write()
            .map_err(poisoned)?
            .push((artifact.clone(), payload));
        Ok(artifact)
    }

    async fn latest_bundle(&self, project_id: &str) -> Result<Option<EvidenceBundle>> {
        let artifacts = self.artifacts.read().map_err(poisoned)?;
        artifacts
            .iter()
            .rev()
            .find(|(a, _)| a.project_id == project_id && a.kind == EVIDENCE_BUNDLE_KIND)
            .map(|(_, payload)| serde_json::from_value(payload.clone()).map_err(EvidenceError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_bundle, sample_summary};
    use crate::types::page::ExtractedContent;

    fn entry(text: &str) -> CacheEntry {
        CacheEntry::new("https://acme.com/pricing", ExtractedContent::new(text), Utc::now())
    }

    #[tokio::test]
    async fn test_upsert_is_last_write_wins() {
        let store = MemoryStore::new();
        store.upsert_entry(&entry("v1")).await.unwrap();
        store.upsert_entry(&entry("v2")).await.unwrap();

        let stored = store.get_entry("https://acme.com/pricing").await.unwrap().unwrap();
        assert_eq!(stored.raw_text, "v2");
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summary_survives_same_content_upsert() {
        let store = MemoryStore::new();
        let e = entry("same");
        store.upsert_entry(&e).await.unwrap();
        assert!(store
            .attach_summary(&e.normalized_url, &e.content_hash, &sample_summary(0.7), "v1")
            .await
            .unwrap());

        store.upsert_entry(&entry("same")).await.unwrap();
        let stored = store.get_entry(&e.normalized_url).await.unwrap().unwrap();
        assert!(stored.summary_for(&e.content_hash, "v1").is_some());

        store.upsert_entry(&entry("changed")).await.unwrap();
        let stored = store.get_entry(&e.normalized_url).await.unwrap().unwrap();
        assert!(stored.summary.is_none());
    }

    #[tokio::test]
    async fn test_attach_summary_requires_matching_hash() {
        let store = MemoryStore::new();
        let e = entry("text");
        store.upsert_entry(&e).await.unwrap();

        let updated = store
            .attach_summary(&e.normalized_url, "stale-hash", &sample_summary(0.5), "v1")
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_latest_bundle_per_project() {
        let store = MemoryStore::new();
        let first = sample_bundle("Acme", 1);
        let second = sample_bundle("Acme", 2);

        store.put_bundle("p1", &first).await.unwrap();
        store.put_bundle("p1", &second).await.unwrap();
        store.put_bundle("p2", &first).await.unwrap();

        assert_eq!(store.latest_bundle("p1").await.unwrap(), Some(second));
        assert_eq!(store.latest_bundle("p2").await.unwrap(), Some(first));
        assert_eq!(store.latest_bundle("p3").await.unwrap(), None);
        assert_eq!(store.artifact_count(), 3);
    }
}
