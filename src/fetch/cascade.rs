//! Ordered execution of fetch strategies.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::ContentType;

use super::archive::ArchiveFetch;
use super::browser::BrowserFetch;
use super::direct::DirectFetch;
use super::extract::quality_failure;
use super::resurrect::ResurrectFetch;
use super::session::SessionFetch;
use super::{
    build_http_client, title_required, FetchConfig, FetchError, FetchOutcome, FetchStrategy,
    RateLimiter,
};

/// The fetch cascade: strategies in fixed order, cheapest first, each with
/// its own timeout, first result over the quality bar wins.
///
/// Exhausting every strategy returns `FetchError::Exhausted` carrying the
/// last strategy's error. Ordinary network and parse failures never
/// propagate as anything else; constructing the cascade is the only
/// operation that can fail for configuration reasons.
pub struct FetchCascade {
    strategies: Vec<Box<dyn FetchStrategy>>,
    config: Arc<FetchConfig>,
}

impl FetchCascade {
    /// Build the default strategy stack. Disabled tiers are left out;
    /// the session tier is only built when credentials exist.
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        for domain in config.credentials.keys() {
            if domain.trim().is_empty() {
                anyhow::bail!("credentials entry with empty domain");
            }
        }

        let config = Arc::new(config);
        let limiter = Arc::new(RateLimiter::new(config.min_delay_ms, config.max_delay_ms));
        let client = build_http_client(&config)?;

        let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();
        strategies.push(Box::new(DirectFetch::new(
            client.clone(),
            config.clone(),
            limiter.clone(),
        )));
        if config.enable_browser {
            strategies.push(Box::new(BrowserFetch::new(config.clone(), limiter.clone())));
        }
        if config.enable_session && !config.credentials.is_empty() {
            strategies.push(Box::new(SessionFetch::new(config.clone(), limiter.clone())));
        }
        if config.enable_archive {
            strategies.push(Box::new(ArchiveFetch::new(
                client.clone(),
                config.clone(),
                limiter.clone(),
            )));
        }
        if config.enable_resurrect {
            strategies.push(Box::new(ResurrectFetch::new(client, config.clone(), limiter)));
        }

        Ok(Self { strategies, config })
    }

    /// Run the cascade over caller-supplied strategies. Test seam, and the
    /// hook for embedders with bespoke retrieval tiers.
    pub fn with_strategies(config: FetchConfig, strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self {
            strategies,
            config: Arc::new(config),
        }
    }

    /// Try each strategy in order until one clears the quality bar
    #[instrument(skip(self), fields(url = %url, content_type = %content_type))]
    pub async fn fetch(
        &self,
        url: &str,
        content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let mut attempts = 0usize;
        let mut last_error: Option<FetchError> = None;

        for strategy in &self.strategies {
            if !strategy.applies_to(url, content_type) {
                debug!(strategy = strategy.name(), "Strategy does not apply, skipping");
                continue;
            }

            attempts += 1;
            debug!(strategy = strategy.name(), "Trying fetch strategy");

            match strategy.fetch(url, content_type).await {
                Ok(outcome) => {
                    if let Some(reason) = quality_failure(
                        &outcome.page,
                        self.config.min_content_chars,
                        self.config.min_word_count,
                        title_required(content_type),
                    ) {
                        debug!(
                            strategy = strategy.name(),
                            reason = %reason,
                            "Result below quality bar"
                        );
                        last_error = Some(FetchError::QualityBar(reason));
                        continue;
                    }

                    info!(
                        strategy = strategy.name(),
                        words = outcome.page.word_count,
                        "Fetch succeeded"
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "Strategy failed");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no applicable fetch strategy".to_string());
        Err(FetchError::Exhausted {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::extract::ExtractedPage;
    use crate::fetch::FetchMethod;
    use async_trait::async_trait;

    /// Stub strategy returning a canned page, or failing when `page` is None
    struct StubStrategy {
        label: &'static str,
        page: Option<ExtractedPage>,
        applies: bool,
    }

    impl StubStrategy {
        fn succeeding(label: &'static str, page: ExtractedPage) -> Self {
            Self {
                label,
                page: Some(page),
                applies: true,
            }
        }

        fn failing(label: &'static str) -> Self {
            Self {
                label,
                page: None,
                applies: true,
            }
        }

        fn inapplicable(label: &'static str) -> Self {
            Self {
                label,
                page: None,
                applies: false,
            }
        }
    }

    #[async_trait]
    impl FetchStrategy for StubStrategy {
        fn name(&self) -> &str {
            self.label
        }

        fn applies_to(&self, _url: &str, _content_type: ContentType) -> bool {
            self.applies
        }

        async fn fetch(
            &self,
            _url: &str,
            _content_type: ContentType,
        ) -> Result<FetchOutcome, FetchError> {
            match &self.page {
                Some(page) => Ok(FetchOutcome::new(page.clone(), FetchMethod::Direct)),
                None => Err(FetchError::Connect(format!("{} always fails", self.label))),
            }
        }
    }

    fn good_page() -> ExtractedPage {
        ExtractedPage::from_text("A Title", "word ".repeat(80))
    }

    fn thin_page() -> ExtractedPage {
        ExtractedPage::from_text("A Title", "thin")
    }

    fn test_config() -> FetchConfig {
        FetchConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_passing_strategy_wins() {
        let cascade = FetchCascade::with_strategies(
            test_config(),
            vec![
                Box::new(StubStrategy::failing("first")),
                Box::new(StubStrategy::succeeding("second", good_page())),
                Box::new(StubStrategy::succeeding("third", good_page())),
            ],
        );

        let outcome = cascade
            .fetch("https://example.com/a", ContentType::Article)
            .await
            .unwrap();
        assert_eq!(outcome.page.title, "A Title");
    }

    #[tokio::test]
    async fn test_thin_result_escalates() {
        let cascade = FetchCascade::with_strategies(
            test_config(),
            vec![
                Box::new(StubStrategy::succeeding("thin", thin_page())),
                Box::new(StubStrategy::succeeding("full", good_page())),
            ],
        );

        let outcome = cascade
            .fetch("https://example.com/a", ContentType::Article)
            .await
            .unwrap();
        assert!(outcome.page.word_count >= 25);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_last_error() {
        let cascade = FetchCascade::with_strategies(
            test_config(),
            vec![
                Box::new(StubStrategy::failing("first")),
                Box::new(StubStrategy::failing("second")),
            ],
        );

        let err = cascade
            .fetch("https://example.com/a", ContentType::Article)
            .await
            .unwrap_err();
        match err {
            FetchError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("second always fails"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inapplicable_strategies_are_not_counted() {
        let cascade = FetchCascade::with_strategies(
            test_config(),
            vec![
                Box::new(StubStrategy::inapplicable("skipped")),
                Box::new(StubStrategy::failing("tried")),
            ],
        );

        let err = cascade
            .fetch("https://example.com/a", ContentType::Article)
            .await
            .unwrap_err();
        match err {
            FetchError::Exhausted { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_strategies_at_all() {
        let cascade = FetchCascade::with_strategies(test_config(), Vec::new());
        let err = cascade
            .fetch("https://example.com/a", ContentType::Article)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no applicable fetch strategy"));
    }
}
