//! URL normalization and content identity.
//!
//! An item's `content_id` is derived from the normalized form of its source
//! URL, so every tracking-parameter variant of the same page collapses to a
//! single identity. Normalization must therefore stay stable: changing these
//! rules changes every derived id.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters removed during normalization (exact matches; any
/// `utm_`-prefixed key is removed as well)
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "mc_cid", "mc_eid", "ref", "ref_src", "source", "cmpid", "igshid",
];

/// Normalize a URL to its canonical deduplication form.
///
/// Lowercases the host and strips a leading `www.`, drops the fragment,
/// removes tracking query parameters, sorts the remaining query pairs, and
/// trims the trailing slash from non-root paths. Default ports disappear
/// during parsing. Input that does not parse as a URL is returned trimmed
/// as-is so identity generation still works for odd strings.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.to_string(),
    };

    if let Some(host) = url.host_str() {
        let host = host.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        // set_host only fails for cannot-be-a-base URLs, which have no host
        let _ = url.set_host(Some(&host));
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

/// Deterministic identity for a URL: SHA256 of the normalized form,
/// truncated to 16 hex chars.
pub fn generate_id(url: &str) -> String {
    short_digest(normalize_url(url).as_bytes())
}

/// Identity for content with no source URL (manually authored notes).
/// Salted with the current time, so otherwise-identical notes get
/// distinct ids. Not deterministic.
pub fn fallback_id(title: &str, content: &str) -> String {
    let seed = format!(
        "{}\n{}\n{}",
        title,
        content,
        chrono::Utc::now().to_rfc3339()
    );
    short_digest(seed.as_bytes())
}

/// Normalized host of a URL, used as the rate-limiter key.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn short_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..8]) // First 16 hex chars (8 bytes)
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    if TRACKING_PARAMS.contains(&key) {
        return true;
    }

    // Any utm_* parameter counts
    key.starts_with("utm_")
}
