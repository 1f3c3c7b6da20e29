//! Typed errors for the evidence pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Batch operations
//! never surface per-item failures through these types; they record them
//! per item instead (see [`FetchFailure`]).

use thiserror::Error;

/// Errors that can occur inside a single pipeline operation.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// Search provider call failed
    #[error("search failed: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Content extraction failed
    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// Structured summarization call failed
    #[error("summarizer error: {0}")]
    Summarizer(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Summarizer output did not match the triage schema, even after repair
    #[error("malformed summary for {url}: {reason}")]
    MalformedSummary { url: String, reason: String },

    /// Deep (Pass B) read failed
    #[error("deep read failed for {url}: {reason}")]
    DeepRead { url: String, reason: String },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl EvidenceError {
    /// Wrap any displayable storage failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string().into())
    }
}

/// Typed per-URL failure recorded by the parallel fetcher.
///
/// Timeouts and budget exhaustion are distinct kinds so they can be
/// counted separately in batch stats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The fetch+extract task did not finish within the per-task timeout
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The batch budget was exhausted before this task started
    #[error("batch budget exceeded; not attempted")]
    BudgetExceeded,

    /// The URL could not be parsed
    #[error("invalid URL")]
    InvalidUrl,

    /// The extractor reported an error
    #[error("extraction error: {0}")]
    Extraction(String),
}

/// Result type alias for evidence operations.
pub type Result<T> = std::result::Result<T, EvidenceError>;
