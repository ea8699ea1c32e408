//! Authenticated session fetch, the cascade's third tier.
//!
//! Sites with configured credentials get a cookie session: log in once,
//! cache the client for the process lifetime, revalidate with a cheap probe
//! before each reuse, and rebuild the session when the probe fails.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{domain_of, ContentType};

use super::extract::PageExtractor;
use super::{
    fetch_body, FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy, RateLimiter,
    SiteCredentials,
};

pub struct SessionFetch {
    config: Arc<FetchConfig>,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
    /// Logged-in cookie clients keyed by domain
    sessions: Mutex<HashMap<String, reqwest::Client>>,
}

impl SessionFetch {
    pub fn new(config: Arc<FetchConfig>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            limiter,
            extractor: PageExtractor::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn build_session_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .user_agent(self.config.user_agent.clone())
            .timeout(self.config.request_timeout())
            .connect_timeout(self.config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(self.config.max_redirects))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))
    }

    async fn login(
        &self,
        domain: &str,
        creds: &SiteCredentials,
    ) -> Result<reqwest::Client, FetchError> {
        let client = self.build_session_client()?;

        self.limiter.wait(domain).await;
        let response = client
            .post(&creds.login_url)
            .form(&[
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &creds.login_url))?;

        if !response.status().is_success() {
            return Err(FetchError::Login {
                domain: domain.to_string(),
                reason: format!("login returned status {}", response.status().as_u16()),
            });
        }

        info!(domain, "Established authenticated session");
        Ok(client)
    }

    /// Cheap GET that tells us whether a cached session is still live
    async fn probe(&self, domain: &str, creds: &SiteCredentials, client: &reqwest::Client) -> bool {
        let path = creds.probe_path.as_deref().unwrap_or("/");
        let probe_url = format!("https://{}{}", domain, path);

        self.limiter.wait(domain).await;
        match client.get(&probe_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Get a live session for the domain, reusing the cache when the probe
    /// passes and logging in again when it does not
    async fn session_for(
        &self,
        domain: &str,
        creds: &SiteCredentials,
    ) -> Result<reqwest::Client, FetchError> {
        let cached = {
            let sessions = self.sessions.lock().await;
            sessions.get(domain).cloned()
        };

        if let Some(client) = cached {
            if self.probe(domain, creds, &client).await {
                debug!(domain, "Reusing cached session");
                return Ok(client);
            }
            warn!(domain, "Cached session failed probe, logging in again");
            self.sessions.lock().await.remove(domain);
        }

        let client = self.login(domain, creds).await?;
        self.sessions
            .lock()
            .await
            .insert(domain.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl FetchStrategy for SessionFetch {
    fn name(&self) -> &str {
        "session"
    }

    fn applies_to(&self, url: &str, _content_type: ContentType) -> bool {
        domain_of(url).map_or(false, |domain| self.config.credentials.contains_key(&domain))
    }

    async fn fetch(
        &self,
        url: &str,
        _content_type: ContentType,
    ) -> Result<FetchOutcome, FetchError> {
        let domain = domain_of(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let creds = self
            .config
            .credentials
            .get(&domain)
            .cloned()
            .ok_or_else(|| FetchError::NoCredentials(domain.clone()))?;

        let client = self.session_for(&domain, &creds).await?;

        self.limiter.wait(&domain).await;
        let html = fetch_body(&client, &self.config, url).await?;
        let page = self.extractor.extract(&html);
        Ok(FetchOutcome::new(page, FetchMethod::Session))
    }
}
