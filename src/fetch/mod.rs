//! Content retrieval: the fetch cascade and its strategies.
//!
//! A URL is handed to `FetchCascade`, which tries strategies in a fixed
//! order, cheapest first: direct HTTP, headless browser render,
//! authenticated session, archived snapshot, URL resurrection. The first
//! strategy whose output passes the quality bar wins; provenance records
//! which one it was. Every network request, in every strategy, waits on the
//! per-domain `RateLimiter` first.

pub mod archive;
pub mod browser;
pub mod cascade;
pub mod direct;
pub mod extract;
pub mod limiter;
pub mod resurrect;
pub mod session;

pub use cascade::FetchCascade;
pub use extract::{ExtractedPage, PageExtractor};
pub use limiter::RateLimiter;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ContentType;

/// Which strategy satisfied a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// Plain HTTP GET
    Direct,

    /// Headless browser DOM dump
    Browser,

    /// Authenticated site session
    Session,

    /// Wayback Machine snapshot
    Archive,

    /// URL-variant heuristics
    Resurrect,
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FetchMethod::Direct => "direct",
            FetchMethod::Browser => "browser",
            FetchMethod::Session => "session",
            FetchMethod::Archive => "archive",
            FetchMethod::Resurrect => "resurrect",
        };
        write!(f, "{}", name)
    }
}

/// Errors during content retrieval
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Unsupported content type: {0}")]
    InvalidContentType(String),

    #[error("Response body exceeded {0} bytes")]
    TooLarge(usize),

    #[error("No usable browser binary found")]
    BrowserUnavailable,

    #[error("Browser render failed: {0}")]
    Browser(String),

    #[error("No credentials configured for {0}")]
    NoCredentials(String),

    #[error("Login failed for {domain}: {reason}")]
    Login { domain: String, reason: String },

    #[error("No archived snapshot for {0}")]
    NoSnapshot(String),

    #[error("Content below quality bar: {0}")]
    QualityBar(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("All strategies failed ({attempts} tried); last error: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    #[error("Request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Classify a reqwest error into the taxonomy
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

/// A successful strategy result: the extracted page, the method tag for
/// stats, and any unstructured provenance the strategy wants recorded
/// (archive timestamp, resurrected URL).
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub page: extract::ExtractedPage,
    pub method: FetchMethod,
    pub provenance: HashMap<String, serde_json::Value>,
}

impl FetchOutcome {
    pub fn new(page: extract::ExtractedPage, method: FetchMethod) -> Self {
        Self {
            page,
            method,
            provenance: HashMap::new(),
        }
    }

    pub fn with_provenance(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.provenance.insert(key.into(), value);
        self
    }
}

/// A single retrieval strategy in the cascade.
///
/// Strategies succeed or fail independently, enforce their own timeouts,
/// and wait on the shared rate limiter before every network request they
/// make.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Cheap, network-free check whether this strategy can serve the URL
    fn applies_to(&self, _url: &str, _content_type: ContentType) -> bool {
        true
    }

    /// Attempt to retrieve and extract the URL
    async fn fetch(&self, url: &str, content_type: ContentType)
        -> Result<FetchOutcome, FetchError>;
}

/// Whether the quality bar demands a title for this kind of content.
/// Media and document pages often carry thin markup around an embed, so
/// only article-like types insist on one.
pub(crate) fn title_required(content_type: ContentType) -> bool {
    matches!(content_type, ContentType::Article | ContentType::Newsletter)
}

/// Credentials for one authenticated site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCredentials {
    /// Form login endpoint
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Path probed to revalidate a cached session (default `/`)
    #[serde(default)]
    pub probe_path: Option<String>,
}

/// Tuning for the fetch cascade.
///
/// Shipped defaults are documented choices, not load-bearing constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent for all outbound requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (direct, session, archive, resurrect)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Headless browser render timeout in seconds
    #[serde(default = "default_browser_timeout")]
    pub browser_timeout_secs: u64,

    /// Response body cap in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Redirects followed per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Quality bar: minimum body length in characters
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Quality bar: minimum word count
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,

    /// Politeness delay window in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Explicit browser binary path; discovered from a known list when unset
    #[serde(default)]
    pub browser_binary: Option<String>,

    /// Strategy toggles
    #[serde(default = "default_true")]
    pub enable_browser: bool,

    #[serde(default = "default_true")]
    pub enable_session: bool,

    #[serde(default = "default_true")]
    pub enable_archive: bool,

    #[serde(default = "default_true")]
    pub enable_resurrect: bool,

    /// Site credentials keyed by domain
    #[serde(default)]
    pub credentials: HashMap<String, SiteCredentials>,
}

fn default_user_agent() -> String {
    concat!("packrat/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_browser_timeout() -> u64 {
    45
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}
fn default_max_redirects() -> usize {
    10
}
fn default_min_content_chars() -> usize {
    150
}
fn default_min_word_count() -> usize {
    25
}
fn default_min_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            browser_timeout_secs: default_browser_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
            min_content_chars: default_min_content_chars(),
            min_word_count: default_min_word_count(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            browser_binary: None,
            enable_browser: true,
            enable_session: true,
            enable_archive: true,
            enable_resurrect: true,
            credentials: HashMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }
}

/// Build the shared HTTP client used by the network strategies
pub fn build_http_client(config: &FetchConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Fetch a URL's body with the shared client, enforcing the body cap and
/// rejecting non-text content types. Used by direct, archive, and resurrect.
pub(crate) async fn fetch_body(
    client: &reqwest::Client,
    config: &FetchConfig,
    url: &str,
) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    if !content_type.contains("text/html")
        && !content_type.contains("application/xhtml")
        && !content_type.contains("text/plain")
    {
        return Err(FetchError::InvalidContentType(content_type));
    }

    if let Some(len) = response.content_length() {
        if len as usize > config.max_body_bytes {
            return Err(FetchError::TooLarge(config.max_body_bytes));
        }
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(e, url))?;

    if body.len() > config.max_body_bytes {
        return Err(FetchError::TooLarge(config.max_body_bytes));
    }

    Ok(body)
}
