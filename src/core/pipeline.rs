//! URL ingestion pipeline.
//!
//! Orchestrates the full path from a submitted URL to a stored, indexed
//! item: skip filter, duplicate check, type detection, rate-limited fetch
//! cascade with retry, persist, index.
//!
//! Two rules shape the error handling:
//! - A URL that passes the skip and duplicate checks always ends as a
//!   persisted item; a failed fetch becomes a stored FAILED record, never
//!   a dropped URL.
//! - Index writes are logged on failure but never fail the call; the index
//!   is derived state, recoverable via `IndexManager::rebuild_from_files`.
//!   Store writes propagate.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::skiplist::SkipList;
use crate::domain::{generate_id, ContentItem, ContentType, ContentTypeDetector, SourceType};
use crate::fetch::{FetchCascade, FetchError, FetchMethod, FetchOutcome};
use crate::store::{FileStore, IndexManager};

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry policy for the fetch step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    2
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ============================================================================
// Pipeline Stats
// ============================================================================

/// Cumulative counters for one pipeline instance
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// URLs fetched, stored, and indexed
    pub processed: u64,

    /// URLs already present in the store
    pub duplicates: u64,

    /// URLs rejected by the skip filter (or empty input)
    pub skipped: u64,

    /// URLs whose every fetch attempt failed (stored as FAILED items)
    pub failed: u64,

    /// Successful fetches per strategy
    pub by_method: HashMap<FetchMethod, u64>,
}

// ============================================================================
// Content Pipeline
// ============================================================================

/// The ingestion orchestrator. All collaborators are injected at
/// construction; the pipeline holds no global state, and two instances
/// interfere only through the store and index they were given.
pub struct ContentPipeline {
    store: FileStore,
    index: IndexManager,
    cascade: FetchCascade,
    detector: ContentTypeDetector,
    skiplist: SkipList,
    retry_policy: RetryPolicy,
    stats: PipelineStats,
}

impl ContentPipeline {
    pub fn new(
        store: FileStore,
        index: IndexManager,
        cascade: FetchCascade,
        skiplist: SkipList,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            index,
            cascade,
            detector: ContentTypeDetector::new(),
            skiplist,
            retry_policy,
            stats: PipelineStats::default(),
        }
    }

    /// Counters accumulated since construction
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The backing file store
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// The backing index, for follow-up writes after ingestion
    pub fn index_mut(&mut self) -> &mut IndexManager {
        &mut self.index
    }

    /// Ingest one URL.
    ///
    /// Returns `Ok(None)` when the URL was skipped or is already stored,
    /// `Ok(Some(item))` for anything that produced a stored record,
    /// including failed fetches (check `item.status`). Errors only on
    /// store or filesystem trouble.
    ///
    /// `force` re-fetches a URL that is already stored. Only fetch-derived
    /// fields are rewritten; the record's identity, relationships, tags,
    /// and user metadata carry over. A failed re-fetch marks the existing
    /// record failed without touching its stored content.
    #[instrument(skip(self, extra), fields(url = %url))]
    pub async fn process_url(
        &mut self,
        url: &str,
        source_type: SourceType,
        force: bool,
        extra: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<Option<ContentItem>> {
        let url = url.trim();
        if url.is_empty() {
            self.stats.skipped += 1;
            return Ok(None);
        }

        if self.skiplist.should_skip(url) {
            debug!("URL matches skip pattern");
            self.stats.skipped += 1;
            return Ok(None);
        }

        let prior = if force {
            self.store.load(&generate_id(url), None, None).await?
        } else if self.store.exists_by_url(url)? {
            info!("Already stored, skipping");
            self.stats.duplicates += 1;
            return Ok(None);
        } else {
            None
        };

        let content_type = self.detector.detect(url);
        debug!(content_type = %content_type, "Detected content type");

        match self.fetch_with_retry(url, content_type).await {
            Ok((outcome, attempts)) => {
                let item = self
                    .persist_success(
                        url,
                        content_type,
                        source_type,
                        outcome,
                        attempts,
                        extra,
                        prior,
                    )
                    .await?;
                Ok(Some(item))
            }
            Err((error, attempts)) => {
                let item = self
                    .persist_failure(url, content_type, source_type, error, attempts, extra, prior)
                    .await?;
                Ok(Some(item))
            }
        }
    }

    /// Run the cascade under the retry policy. Returns the outcome or the
    /// final error, either way with the number of attempts consumed.
    async fn fetch_with_retry(
        &self,
        url: &str,
        content_type: ContentType,
    ) -> std::result::Result<(FetchOutcome, u32), (FetchError, u32)> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.cascade.fetch(url, content_type).await {
                Ok(outcome) => return Ok((outcome, attempt)),
                Err(e) => {
                    if self.retry_policy.should_retry(attempt) {
                        let delay = self.retry_policy.delay_for_attempt(attempt);

                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Fetch failed, retrying"
                        );

                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err((e, attempt));
                }
            }
        }
    }

    async fn persist_success(
        &mut self,
        url: &str,
        content_type: ContentType,
        source_type: SourceType,
        outcome: FetchOutcome,
        attempts: u32,
        extra: Option<HashMap<String, serde_json::Value>>,
        prior: Option<ContentItem>,
    ) -> Result<ContentItem> {
        let page = outcome.page;

        // A fresh fetch builds a new record; a forced re-fetch refreshes the
        // stored one, so ingested_at, relationships, tags, and the typed
        // media fields carry over untouched.
        let mut item = match &prior {
            Some(prior) => prior.clone(),
            None => ContentItem::new(url, content_type).with_source(source_type),
        };

        if !page.title.trim().is_empty() {
            item.title = page.title.clone();
        }
        item.author = page.author.clone();
        item.description = page.description.clone();
        item.published_at = page.published_at;
        // created_at drives the storage partition: the content's own date
        // when extraction found one, else the date the record already lives
        // under, else ingestion time.
        if let Some(published) = page.published_at {
            item.created_at = published;
        }
        item.processing_attempts = attempts;
        item.mark_completed();

        if let Some(extra) = extra {
            item.extra.extend(extra);
        }
        item.extra.insert(
            "fetch_method".to_string(),
            serde_json::Value::String(outcome.method.to_string()),
        );
        item.extra.insert(
            "word_count".to_string(),
            serde_json::Value::from(page.word_count as u64),
        );
        item.extra.extend(outcome.provenance);

        let body = if page.body.trim().is_empty() {
            None
        } else {
            Some(page.body.as_str())
        };

        let dir = self
            .store
            .save(&mut item, body, None)
            .await
            .with_context(|| format!("Failed to persist fetched item for {}", url))?;

        // A re-fetch moves the item when its content date changes; the copy
        // under the old partition must not linger.
        if let Some(prior) = &prior {
            if self.store.item_dir(prior) != dir {
                self.store.delete_copy(prior).await?;
            }
        }

        if let Err(e) = self.index.index_item(&item, &dir.to_string_lossy(), body) {
            warn!(
                content_id = %item.content_id,
                error = %e,
                "Index write failed, run rebuild to repair"
            );
        }

        self.stats.processed += 1;
        *self.stats.by_method.entry(outcome.method).or_insert(0) += 1;

        info!(
            content_id = %item.content_id,
            method = %outcome.method,
            words = page.word_count,
            "Stored item"
        );

        Ok(item)
    }

    async fn persist_failure(
        &mut self,
        url: &str,
        content_type: ContentType,
        source_type: SourceType,
        error: FetchError,
        attempts: u32,
        extra: Option<HashMap<String, serde_json::Value>>,
        prior: Option<ContentItem>,
    ) -> Result<ContentItem> {
        warn!(attempts, error = %error, "All fetch attempts failed, storing failed item");

        // A fresh failure stores a placeholder record, title left as the
        // URL; a forced re-fetch marks the existing record failed in place,
        // keeping its stored content.
        let mut item = match prior {
            Some(prior) => prior,
            None => ContentItem::new(url, content_type).with_source(source_type),
        };
        item.processing_attempts = attempts;
        item.mark_failed(error.to_string());

        if let Some(extra) = extra {
            item.extra.extend(extra);
        }

        let dir = self
            .store
            .save(&mut item, None, None)
            .await
            .with_context(|| format!("Failed to persist failed item for {}", url))?;

        if let Err(e) = self.index.index_item(&item, &dir.to_string_lossy(), None) {
            warn!(
                content_id = %item.content_id,
                error = %e,
                "Index write failed, run rebuild to repair"
            );
        }

        self.stats.failed += 1;

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.initial_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30000);
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10000)); // Capped
    }

    #[test]
    fn test_should_retry_stops_at_max_attempts() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
