//! URL resurrection, the cascade's last tier.
//!
//! When the submitted URL is dead everywhere, a close variant sometimes
//! still resolves: the page moved between http and https, an amp mirror
//! survives, or a stale query string 404s while the bare path works. Each
//! candidate goes through a plain fetch and must clear the quality bar
//! itself before it wins.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::domain::{domain_of, ContentType};

use super::extract::{quality_failure, PageExtractor};
use super::{
    fetch_body, title_required, FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy,
    RateLimiter,
};

/// Variant URLs worth trying when the original is dead, in order.
/// The original itself is excluded, as are duplicates between rules.
pub fn candidate_urls(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };

    let mut variants: Vec<String> = Vec::new();

    if parsed.query().is_some() {
        let mut stripped = parsed.clone();
        stripped.set_query(None);
        variants.push(stripped.to_string());
    }

    {
        let mut toggled = parsed.clone();
        let other_scheme = if parsed.scheme() == "https" { "http" } else { "https" };
        if toggled.set_scheme(other_scheme).is_ok() {
            variants.push(toggled.to_string());
        }
    }

    if let Some(bare_host) = parsed.host_str().and_then(|h| h.strip_prefix("amp.")) {
        let bare_host = bare_host.to_string();
        let mut unamped = parsed.clone();
        if unamped.set_host(Some(&bare_host)).is_ok() {
            variants.push(unamped.to_string());
        }
    }

    if parsed.path().ends_with("/amp") {
        let path = parsed.path().trim_end_matches("/amp").to_string();
        let mut unamped = parsed.clone();
        unamped.set_path(if path.is_empty() { "/" } else { &path });
        variants.push(unamped.to_string());
    }

    if parsed.path().ends_with("/index.html") {
        let path = parsed.path().trim_end_matches("index.html").to_string();
        let mut bare = parsed.clone();
        bare.set_path(&path);
        variants.push(bare.to_string());
    }

    let mut unique = Vec::new();
    for variant in variants {
        if variant != url && !unique.contains(&variant) {
            unique.push(variant);
        }
    }
    unique
}

pub struct ResurrectFetch {
    client: reqwest::Client,
    config: Arc<FetchConfig>,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
}

impl ResurrectFetch {
    pub fn new(client: reqwest::Client, config: Arc<FetchConfig>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            config,
            limiter,
            extractor: PageExtractor::new(),
        }
    }
}

#[async_trait]
impl FetchStrategy for ResurrectFetch {
    fn name(&self) -> &str {
        "resurrect"
    }

    fn applies_to(&self, url: &str, _content_type: ContentType) -> bool {
        !candidate_urls(url).is_empty()
    }

    async fn fetch(
        &self,
        url: &str,
        content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let candidates = candidate_urls(url);
        if candidates.is_empty() {
            return Err(FetchError::Other("no URL variants to try".to_string()));
        }

        let mut last_error = FetchError::Other("no URL variants to try".to_string());

        for candidate in candidates {
            let Some(domain) = domain_of(&candidate) else {
                continue;
            };
            self.limiter.wait(&domain).await;

            debug!(candidate = %candidate, "Trying resurrected URL variant");
            match fetch_body(&self.client, &self.config, &candidate).await {
                Ok(html) => {
                    let page = self.extractor.extract(&html);
                    if let Some(reason) = quality_failure(
                        &page,
                        self.config.min_content_chars,
                        self.config.min_word_count,
                        title_required(content_type),
                    ) {
                        debug!(candidate = %candidate, reason = %reason, "Variant below quality bar");
                        last_error = FetchError::QualityBar(reason);
                        continue;
                    }

                    return Ok(FetchOutcome::new(page, FetchMethod::Resurrect)
                        .with_provenance("resurrected_url", serde_json::json!(candidate)));
                }
                Err(e) => {
                    debug!(candidate = %candidate, error = %e, "Variant fetch failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
