//! Triage prompt and its schema version.
//!
//! The summary schema version is derived from the prompt and the response
//! schema, so any change to either invalidates cached summaries.

use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use crate::types::summary::TriageResponse;

/// System prompt for Pass A triage.
pub const TRIAGE_SYSTEM_PROMPT: &str = r#"You triage web pages for a competitive analysis of a software company.
Read the page and return a single JSON object, no prose.

- category: the evidence category the page best belongs to
  (pricing, docs, changelog, status, reviews, jobs, security, community, blog, other)
- signals: up to 8 short, concrete facts (prices, plan names, versions, certifications, ratings)
- coverage_score: 0.0 to 1.0, how much concrete evidence the page holds
- recency_hint: last_30_days, last_90_days, last_year, older or unknown
- credibility_hint: official (the company's own site), third_party, or community
- recommended_for_deep_read: true only if a careful read would yield several new facts"#;

/// User prompt template for one page.
pub const TRIAGE_USER_PROMPT: &str = "Page URL: {url}\nPage Content:\n{content}";

/// Format the user prompt for one page.
pub fn format_triage_prompt(url: &str, content: &str) -> String {
    TRIAGE_USER_PROMPT
        .replace("{url}", url)
        .replace("{content}", content)
}

/// JSON schema for [`TriageResponse`], pretty-printed.
pub fn triage_response_schema() -> String {
    let schema = schemars::schema_for!(TriageResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

static SUMMARY_SCHEMA_VERSION: LazyLock<String> = LazyLock::new(|| {
    let mut hasher = Sha256::new();
    hasher.update(TRIAGE_SYSTEM_PROMPT.as_bytes());
    hasher.update(TRIAGE_USER_PROMPT.as_bytes());
    hasher.update(triage_response_schema().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("triage-{}", &digest[..12])
});

/// Version tag stored next to cached summaries.
pub fn summary_schema_version() -> &'static str {
    SUMMARY_SCHEMA_VERSION.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_stable() {
        assert_eq!(summary_schema_version(), summary_schema_version());
        assert!(summary_schema_version().starts_with("triage-"));
    }

    #[test]
    fn test_schema_mentions_fields() {
        let schema = triage_response_schema();
        assert!(schema.contains("coverage_score"));
        assert!(schema.contains("recommended_for_deep_read"));
    }

    #[test]
    fn test_format_prompt() {
        let prompt = format_triage_prompt("https://acme.com/pricing", "Pro $49");
        assert!(prompt.contains("https://acme.com/pricing"));
        assert!(prompt.ends_with("Pro $49"));
    }
}
