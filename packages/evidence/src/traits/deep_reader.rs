//! Deep reader - the expensive Pass B extraction, run only on the shortlist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    claim::ClaimConfidence,
    page::FetchedPage,
    summary::PageSummary,
};

/// A claim-sized finding produced by a deep read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepFinding {
    pub claim_text: String,

    /// Supporting quote from the page, if the reader kept one
    pub excerpt: Option<String>,

    pub confidence: Option<ClaimConfidence>,

    pub published_at: Option<DateTime<Utc>>,
}

impl DeepFinding {
    pub fn new(claim_text: impl Into<String>) -> Self {
        Self {
            claim_text: claim_text.into(),
            excerpt: None,
            confidence: None,
            published_at: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_confidence(mut self, confidence: ClaimConfidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Expensive, page-level evidence extraction.
#[async_trait]
pub trait DeepReader: Send + Sync {
    async fn deep_read(&self, page: &FetchedPage, summary: &PageSummary) -> Result<Vec<DeepFinding>>;
}
