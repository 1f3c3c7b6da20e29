//! SQLite storage implementation.
//!
//! Cache writes use `INSERT ... ON CONFLICT DO UPDATE` so concurrent fetches
//! of the same URL resolve at the storage layer (last write wins). Artifacts
//! are append-only rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{EvidenceError, Result};
use crate::traits::store::{ArtifactStore, EvidenceCache, StoredArtifact, EVIDENCE_BUNDLE_KIND};
use crate::types::{
    bundle::EvidenceBundle,
    page::{CacheEntry, ExtractedContent},
    summary::PageSummary,
};

/// SQLite-based cache and artifact store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./evidence.db?mode=rwc` - File-based, create if missing
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(EvidenceError::storage)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Uses a single connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(EvidenceError::storage)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                normalized_url TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                extracted TEXT NOT NULL,
                summary TEXT,
                summary_version TEXT,
                staleness_window_days INTEGER NOT NULL DEFAULT 7,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_artifacts_project_kind ON artifacts(project_id, kind, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EvidenceError::storage(format!("invalid timestamp {}: {}", raw, e)))
}

#[derive(Debug, FromRow)]
struct CacheRow {
    normalized_url: String,
    content_hash: String,
    raw_text: String,
    extracted: String,
    summary: Option<String>,
    summary_version: Option<String>,
    staleness_window_days: i64,
    fetched_at: String,
}

impl CacheRow {
    fn into_entry(self) -> Result<CacheEntry> {
        let extracted: ExtractedContent = serde_json::from_str(&self.extracted)?;
        let summary: Option<PageSummary> = self
            .summary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(CacheEntry {
            normalized_url: self.normalized_url,
            content_hash: self.content_hash,
            raw_text: self.raw_text,
            extracted,
            summary,
            summary_version: self.summary_version,
            staleness_window_days: u32::try_from(self.staleness_window_days).unwrap_or(0),
            fetched_at: parse_timestamp(&self.fetched_at)?,
        })
    }
}

#[async_trait]
impl EvidenceCache for SqliteStore {
    async fn get_entry(&self, normalized_url: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT normalized_url, content_hash, raw_text, extracted, summary, summary_version, \
             staleness_window_days, fetched_at FROM cache_entries WHERE normalized_url = ?",
        )
        .bind(normalized_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        row.map(CacheRow::into_entry).transpose()
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> Result<()> {
        let extracted = serde_json::to_string(&entry.extracted)?;
        let summary = entry
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (
                normalized_url, content_hash, raw_text, extracted, summary,
                summary_version, staleness_window_days, fetched_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(normalized_url) DO UPDATE SET
                content_hash = excluded.content_hash,
                raw_text = excluded.raw_text,
                extracted = excluded.extracted,
                summary = CASE
                    WHEN excluded.summary IS NULL
                         AND cache_entries.content_hash = excluded.content_hash
                    THEN cache_entries.summary
                    ELSE excluded.summary
                END,
                summary_version = CASE
                    WHEN excluded.summary IS NULL
                         AND cache_entries.content_hash = excluded.content_hash
                    THEN cache_entries.summary_version
                    ELSE excluded.summary_version
                END,
                staleness_window_days = excluded.staleness_window_days,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&entry.normalized_url)
        .bind(&entry.content_hash)
        .bind(&entry.raw_text)
        .bind(&extracted)
        .bind(&summary)
        .bind(&entry.summary_version)
        .bind(i64::from(entry.staleness_window_days))
        .bind(entry.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        Ok(())
    }

    async fn attach_summary(
        &self,
        normalized_url: &str,
        content_hash: &str,
        summary: &PageSummary,
        version: &str,
    ) -> Result<bool> {
        let summary = serde_json::to_string(summary)?;
        let result = sqlx::query(
            "UPDATE cache_entries SET summary = ?, summary_version = ? \
             WHERE normalized_url = ? AND content_hash = ?",
        )
        .bind(&summary)
        .bind(version)
        .bind(normalized_url)
        .bind(content_hash)
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_entries(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(EvidenceError::storage)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl ArtifactStore for SqliteStore {
    async fn put_bundle(&self, project_id: &str, bundle: &EvidenceBundle) -> Result<StoredArtifact> {
        let payload = serde_json::to_string(bundle)?;
        let artifact = StoredArtifact {
            id: Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            kind: EVIDENCE_BUNDLE_KIND.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO artifacts (id, project_id, kind, payload, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&artifact.id)
        .bind(&artifact.project_id)
        .bind(&artifact.kind)
        .bind(&payload)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        Ok(artifact)
    }

    async fn latest_bundle(&self, project_id: &str) -> Result<Option<EvidenceBundle>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM artifacts WHERE project_id = ? AND kind = ? \
             ORDER BY created_at DESC, seq DESC LIMIT 1",
        )
        .bind(project_id)
        .bind(EVIDENCE_BUNDLE_KIND)
        .fetch_optional(&self.pool)
        .await
        .map_err(EvidenceError::storage)?;

        row.map(|(payload,)| serde_json::from_str(&payload).map_err(EvidenceError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_bundle, sample_summary};

    fn entry(text: &str) -> CacheEntry {
        CacheEntry::new("https://acme.com/docs", ExtractedContent::new(text), Utc::now())
    }

    #[tokio::test]
    async fn test_upsert_and_read_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        let e = entry("Docs v1");
        store.upsert_entry(&e).await.unwrap();

        let stored = store.get_entry(&e.normalized_url).await.unwrap().unwrap();
        assert_eq!(stored.content_hash, e.content_hash);
        assert_eq!(stored.extracted, e.extracted);

        store.upsert_entry(&entry("Docs v2")).await.unwrap();
        assert_eq!(store.count_entries().await.unwrap(), 1);
        let stored = store.get_entry(&e.normalized_url).await.unwrap().unwrap();
        assert_eq!(stored.raw_text, "Docs v2");
    }

    #[tokio::test]
    async fn test_summary_kept_when_content_unchanged() {
        let store = SqliteStore::in_memory().await.unwrap();
        let e = entry("Same docs");
        store.upsert_entry(&e).await.unwrap();
        store
            .attach_summary(&e.normalized_url, &e.content_hash, &sample_summary(0.9), "v1")
            .await
            .unwrap();

        store.upsert_entry(&entry("Same docs")).await.unwrap();
        let stored = store.get_entry(&e.normalized_url).await.unwrap().unwrap();
        assert_eq!(
            stored.summary_for(&e.content_hash, "v1").map(|s| s.coverage_score),
            Some(0.9)
        );
    }

    #[tokio::test]
    async fn test_latest_bundle() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.put_bundle("p1", &sample_bundle("Acme", 1)).await.unwrap();
        store.put_bundle("p1", &sample_bundle("Acme", 3)).await.unwrap();

        let latest = store.latest_bundle("p1").await.unwrap().unwrap();
        assert_eq!(latest.totals.sources, 3);
        assert!(store.latest_bundle("other").await.unwrap().is_none());
    }
}
