//! Archived snapshot fetch, the cascade's fourth tier.
//!
//! Asks the Wayback Machine's availability API for the closest snapshot of
//! a URL and fetches that. Pages that have vanished from the live web often
//! survive here; provenance records that the content is historical rather
//! than current.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{domain_of, ContentType};

use super::extract::PageExtractor;
use super::{
    fetch_body, FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy, RateLimiter,
};

const AVAILABILITY_ENDPOINT: &str = "https://archive.org/wayback/available";

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
    #[serde(default)]
    timestamp: String,
}

pub struct ArchiveFetch {
    client: reqwest::Client,
    config: Arc<FetchConfig>,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
}

impl ArchiveFetch {
    pub fn new(client: reqwest::Client, config: Arc<FetchConfig>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            config,
            limiter,
            extractor: PageExtractor::new(),
        }
    }

    /// Look up the closest archived snapshot for a URL
    async fn lookup_snapshot(&self, url: &str) -> Result<Snapshot, FetchError> {
        self.limiter.wait("archive.org").await;

        let response = self
            .client
            .get(AVAILABILITY_ENDPOINT)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, AVAILABILITY_ENDPOINT))?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: AVAILABILITY_ENDPOINT.to_string(),
            });
        }

        let availability: AvailabilityResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Other(format!("availability response: {}", e)))?;

        match availability.archived_snapshots.closest {
            Some(snapshot) if snapshot.available && !snapshot.url.is_empty() => Ok(snapshot),
            _ => Err(FetchError::NoSnapshot(url.to_string())),
        }
    }
}

#[async_trait]
impl FetchStrategy for ArchiveFetch {
    fn name(&self) -> &str {
        "archive"
    }

    async fn fetch(
        &self,
        url: &str,
        _content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let snapshot = self.lookup_snapshot(url).await?;
        debug!(
            snapshot_url = %snapshot.url,
            timestamp = %snapshot.timestamp,
            "Found archived snapshot"
        );

        // The snapshot lives on its own host; wait on that domain too
        let snapshot_domain =
            domain_of(&snapshot.url).unwrap_or_else(|| "web.archive.org".to_string());
        self.limiter.wait(&snapshot_domain).await;

        let html = fetch_body(&self.client, &self.config, &snapshot.url).await?;
        let page = self.extractor.extract(&html);

        Ok(FetchOutcome::new(page, FetchMethod::Archive)
            .with_provenance("from_archive", serde_json::json!(true))
            .with_provenance("archive_url", serde_json::json!(snapshot.url))
            .with_provenance("archive_timestamp", serde_json::json!(snapshot.timestamp)))
    }
}
