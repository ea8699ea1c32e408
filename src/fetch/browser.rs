//! Headless browser rendering, the cascade's second tier.
//!
//! Spawns a headless chromium with an isolated scratch profile and reads
//! the rendered DOM from `--dump-dom`. Catches the JS-app shells the direct
//! tier cannot read. Skipped cleanly when no browser binary is installed.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::paths::BROWSER_BINARIES;
use crate::domain::{domain_of, ContentType};

use super::extract::PageExtractor;
use super::{FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy, RateLimiter};

pub struct BrowserFetch {
    /// Resolved browser binary, None when nothing usable was found
    binary: Option<String>,
    config: Arc<FetchConfig>,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
}

impl BrowserFetch {
    pub fn new(config: Arc<FetchConfig>, limiter: Arc<RateLimiter>) -> Self {
        let binary = config.browser_binary.clone().or_else(discover_browser);
        if binary.is_none() {
            debug!("No headless browser binary found, browser tier will be skipped");
        }
        Self {
            binary,
            config,
            limiter,
            extractor: PageExtractor::new(),
        }
    }

    /// Render the page and return the dumped DOM
    async fn dump_dom(&self, binary: &str, url: &str) -> Result<String, FetchError> {
        // Isolated profile keeps renders hermetic; the dir is removed on drop
        let profile = tempfile::tempdir().map_err(|e| FetchError::Browser(e.to_string()))?;

        let output = timeout(
            self.config.browser_timeout(),
            Command::new(binary)
                .arg("--headless")
                .arg("--disable-gpu")
                .arg(format!("--user-data-dir={}", profile.path().display()))
                .arg("--dump-dom")
                .arg(url)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| FetchError::Timeout(format!("browser render of {}", url)))?
        .map_err(|e| FetchError::Browser(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Browser(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| FetchError::Browser("DOM dump is not valid UTF-8".to_string()))
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetch {
    fn name(&self) -> &str {
        "browser"
    }

    fn applies_to(&self, _url: &str, _content_type: ContentType) -> bool {
        self.binary.is_some()
    }

    async fn fetch(
        &self,
        url: &str,
        _content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let binary = self
            .binary
            .clone()
            .ok_or(FetchError::BrowserUnavailable)?;
        let domain = domain_of(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        self.limiter.wait(&domain).await;

        let html = self.dump_dom(&binary, url).await?;
        let page = self.extractor.extract(&html);
        Ok(FetchOutcome::new(page, FetchMethod::Browser))
    }
}

/// Probe the known install names and return the first binary that answers
fn discover_browser() -> Option<String> {
    BROWSER_BINARIES
        .iter()
        .find(|name| {
            std::process::Command::new(name)
                .arg("--version")
                .output()
                .is_ok()
        })
        .map(|name| name.to_string())
}
