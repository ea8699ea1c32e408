//! Direct HTTP fetch, the cascade's first tier.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{domain_of, ContentType};

use super::extract::{looks_js_rendered, quality_failure, PageExtractor};
use super::{
    fetch_body, title_required, FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy,
    RateLimiter,
};

/// Plain GET through the shared client. Cheap and sufficient for most
/// server-rendered pages. A page whose extraction comes up thin while the
/// markup carries JS-app markers is reported as a shell so the cascade
/// escalates to the browser tier.
pub struct DirectFetch {
    client: reqwest::Client,
    config: Arc<FetchConfig>,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
}

impl DirectFetch {
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
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch(
        &self,
        url: &str,
        content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let domain = domain_of(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        self.limiter.wait(&domain).await;

        let html = fetch_body(&self.client, &self.config, url).await?;
        let page = self.extractor.extract(&html);

        let below_bar = quality_failure(
            &page,
            self.config.min_content_chars,
            self.config.min_word_count,
            title_required(content_type),
        );
        if below_bar.is_some() && looks_js_rendered(&html) {
            return Err(FetchError::QualityBar(
                "page appears to be a JS app shell".to_string(),
            ));
        }

        Ok(FetchOutcome::new(page, FetchMethod::Direct))
    }
}
