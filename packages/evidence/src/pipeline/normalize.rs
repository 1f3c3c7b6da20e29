//! Canonicalization of URLs, domains, excerpts and claim text.
//!
//! Canonical URLs are the identity key for both dedup and the page cache,
//! so every rule here must stay stable: a change invalidates cache keys.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Query parameters dropped during canonicalization (besides `utm_*`).
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "mc_cid", "mc_eid", "ref", "_ga", "_gid"];

/// Appended to truncated excerpts.
pub const ELLIPSIS: &str = "…";

static RE_HOST_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[A-Za-z][A-Za-z0-9+.\-]*://)?(?:[^@/\s]*@)?([^/:?#\s]+)").unwrap()
});

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Strip leading `www.` labels, keeping at least one dot in what remains.
fn strip_www(host: &str) -> &str {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        host = rest;
    }
    host
}

/// Canonicalize a URL. Returns `None` when the input cannot be parsed.
///
/// Rules: lowercase host, strip `www.`, force https, drop the fragment,
/// drop tracking parameters, drop trailing path slashes (root excepted),
/// sort the remaining query parameters by key, then value.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", trimmed)).ok()?
        }
        Err(_) => return None,
    };

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let host = strip_www(host.trim_end_matches('.')).to_string();
    if host.is_empty() {
        return None;
    }

    if url.scheme() != "https" {
        url.set_scheme("https").ok()?;
    }
    if url.port() == Some(443) {
        url.set_port(None).ok()?;
    }
    url.set_host(Some(&host)).ok()?;
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        url.set_query(Some(&query));
    }

    // Every trailing slash goes, so a canonical URL canonicalizes to itself.
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    Some(url.to_string())
}

/// Canonical URL, or the trimmed input when it cannot be parsed.
pub fn canonical_or_raw(raw: &str) -> String {
    canonicalize_url(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Normalize a bare domain: lowercase, no trailing dot, no `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    strip_www(lower.trim_end_matches('.')).to_string()
}

/// Domain of a URL. Never fails: falls back to a regex over the raw text,
/// and returns an empty string when nothing host-like is present.
pub fn extract_domain(raw: &str) -> String {
    if let Some(host) = canonicalize_url(raw)
        .and_then(|c| Url::parse(&c).ok())
        .and_then(|u| u.host_str().map(str::to_string))
    {
        return normalize_domain(&host);
    }

    RE_HOST_FALLBACK
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .map(|m| normalize_domain(m.as_str()))
        .unwrap_or_default()
}

/// Whether `domain` equals `parent` or is one of its subdomains.
pub fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
    let domain = normalize_domain(domain);
    let parent = normalize_domain(parent);
    if domain.is_empty() || parent.is_empty() {
        return false;
    }
    domain == parent || domain.ends_with(&format!(".{}", parent))
}

/// Collapse all whitespace runs (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Claim text as used for fingerprints and similarity.
pub fn normalize_claim_text(text: &str) -> String {
    collapse_whitespace(text)
}

/// Collapse whitespace and truncate to `max_chars`, breaking at the last
/// whitespace before the cutoff and appending [`ELLIPSIS`].
pub fn normalize_excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    let on_boundary = collapsed.chars().nth(max_chars) == Some(' ');
    let head = match cut.rfind(' ') {
        _ if on_boundary => cut.as_str(),
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}{}", head.trim_end(), ELLIPSIS)
}

/// Best-effort parse of a search-provider date string.
pub fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonicalize_full_rules() {
        let canonical = canonicalize_url(
            "http://WWW.Acme.com/Pricing/?utm_source=x&b=2&gclid=abc&a=1&ref=hn#plans",
        )
        .unwrap();
        assert_eq!(canonical, "https://acme.com/Pricing?a=1&b=2");
    }

    #[test]
    fn test_canonicalize_root_keeps_slash() {
        assert_eq!(canonicalize_url("https://acme.com/").unwrap(), "https://acme.com/");
        assert_eq!(canonicalize_url("acme.com").unwrap(), "https://acme.com/");
    }

    #[test]
    fn test_canonicalize_sorts_repeated_keys_by_value() {
        assert_eq!(
            canonicalize_url("https://acme.com/p?a=2&a=1").unwrap(),
            canonicalize_url("https://acme.com/p?a=1&a=2").unwrap()
        );
        assert_eq!(canonicalize_url("https://acme.com/p?b=1&a=2&a=1").unwrap(), "https://acme.com/p?a=1&a=2&b=1");
    }

    #[test]
    fn test_canonicalize_trims_every_trailing_slash() {
        assert_eq!(canonicalize_url("https://acme.com/a//").unwrap(), "https://acme.com/a");
        assert_eq!(canonicalize_url("https://acme.com/a/").unwrap(), "https://acme.com/a");
        assert_eq!(canonicalize_url("https://acme.com//").unwrap(), "https://acme.com/");
    }

    #[test]
    fn test_canonicalize_strips_all_tracking_params() {
        let canonical = canonicalize_url(
            "https://acme.com/blog?utm_medium=a&UTM_CAMPAIGN=b&fbclid=c&mc_cid=d&mc_eid=e&_ga=f&_gid=g",
        )
        .unwrap();
        assert_eq!(canonical, "https://acme.com/blog");
    }

    #[test]
    fn test_canonicalize_rejects_garbage() {
        assert!(canonicalize_url("").is_none());
        assert!(canonicalize_url("mailto:sales@acme.com").is_none());
        assert_eq!(canonical_or_raw("  not a url  "), "not a url");
    }

    #[test]
    fn test_canonicalize_is_idempotent_on_known_urls() {
        for raw in [
            "http://www.acme.com/docs/api/?z=1&a=2#x",
            "https://docs.acme.com:8443/v2//",
            "https://acme.com/search?q=hello+world&lang=en",
        ] {
            let once = canonicalize_url(raw).unwrap();
            assert_eq!(canonicalize_url(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://WWW.Acme.com/pricing"), "acme.com");
        assert_eq!(extract_domain("docs.acme.com/start"), "docs.acme.com");
        assert_eq!(extract_domain("ftp://files.acme.com/x"), "files.acme.com");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn test_is_same_or_subdomain() {
        assert!(is_same_or_subdomain("acme.com", "acme.com"));
        assert!(is_same_or_subdomain("docs.acme.com", "www.acme.com"));
        assert!(!is_same_or_subdomain("notacme.com", "acme.com"));
        assert!(!is_same_or_subdomain("acme.com", ""));
    }

    #[test]
    fn test_normalize_excerpt_breaks_at_whitespace() {
        let text = "The   Pro plan\ncosts $49 per month billed annually";
        assert_eq!(normalize_excerpt(text, 100), "The Pro plan costs $49 per month billed annually");
        assert_eq!(normalize_excerpt(text, 16), "The Pro plan…");
    }

    #[test]
    fn test_normalize_excerpt_keeps_word_ending_at_cutoff() {
        assert_eq!(normalize_excerpt("The Pro plan costs money", 12), "The Pro plan…");
        assert_eq!(normalize_excerpt("The Pro plan costs money", 13), "The Pro plan…");
        assert_eq!(normalize_excerpt("The Pro plan costs money", 11), "The Pro…");
    }

    #[test]
    fn test_normalize_excerpt_without_whitespace_cuts_hard() {
        assert_eq!(normalize_excerpt("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn test_normalize_claim_text() {
        assert_eq!(normalize_claim_text("  SOC 2\n\tType  II  "), "SOC 2 Type II");
    }

    #[test]
    fn test_parse_published_date_formats() {
        assert!(parse_published_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_published_date("2024-03-01").is_some());
        assert!(parse_published_date("Fri, 01 Mar 2024 10:00:00 +0000").is_some());
        assert!(parse_published_date("last week").is_none());
    }

    proptest! {
        #[test]
        fn prop_canonicalize_idempotent(
            host in "[a-z]{1,8}(\\.[a-z]{2,5}){1,2}",
            www in any::<bool>(),
            segments in proptest::collection::vec("[a-zA-Z0-9_-]{1,6}", 0..4),
            trailing in any::<bool>(),
            params in proptest::collection::vec(("[a-z_]{1,6}", "[a-z0-9]{0,4}"), 0..4),
        ) {
            let mut raw = format!("http://{}{}/{}", if www { "www." } else { "" }, host, segments.join("/"));
            if trailing {
                raw.push('/');
            }
            if !params.is_empty() {
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                raw.push('?');
                raw.push_str(&query.join("&"));
            }

            let once = canonicalize_url(&raw).unwrap();
            let twice = canonicalize_url(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
