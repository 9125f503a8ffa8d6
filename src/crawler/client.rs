//! Rate-limited HTTP client
//!
//! This module wraps a reqwest client with:
//! - A cap on in-flight requests
//! - A browser identity (User-Agent) that can be rotated between batches
//! - The extra headers the site's search endpoint expects

use crate::config::{CrawlerConfig, SiteConfig};
use crate::{Result, ScrapeError};
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Desktop browser identities rotated through by [`RateLimitedClient::reset`]
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const REQUESTED_BY_LEN: usize = 180;
const REQUESTED_BY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The spoofed browser identity attached to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_agent: String,
}

impl Identity {
    /// Picks a random identity from the built-in pool
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        Self {
            user_agent: user_agent.to_string(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Builds the per-request token the search endpoint checks for
fn requested_by_token() -> String {
    let mut rng = rand::rng();
    (0..REQUESTED_BY_LEN)
        .map(|_| char::from(REQUESTED_BY_CHARSET[rng.random_range(0..REQUESTED_BY_CHARSET.len())]))
        .collect()
}

/// HTTP client with a connection cap and a rotatable identity
///
/// Only [`reset`](Self::reset) mutates the client, and it needs `&mut self`;
/// fetches borrow it shared. A reset therefore cannot overlap an in-flight
/// request.
pub struct RateLimitedClient {
    http: Client,
    identity: Identity,
    permits: Semaphore,
    base_url: String,
    timeout: Duration,
    max_connections: usize,
}

impl RateLimitedClient {
    /// Creates a client for the configured site with a random identity
    pub fn new(crawler: &CrawlerConfig, site: &SiteConfig) -> Result<Self> {
        let max_connections = crawler.max_connections.max(1) as usize;
        let timeout = Duration::from_secs(crawler.request_timeout_secs);
        let identity = Identity::random();
        let http = build_http_client(&identity, timeout, max_connections)?;

        Ok(Self {
            http,
            identity,
            permits: Semaphore::new(max_connections),
            base_url: site.base_url.trim_end_matches('/').to_string(),
            timeout,
            max_connections,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the identity and the underlying connection pool
    ///
    /// If the new client cannot be built the current identity stays in use.
    pub fn reset(&mut self) {
        self.rotate_with(build_http_client);
    }

    fn rotate_with<F>(&mut self, build: F) -> bool
    where
        F: FnOnce(&Identity, Duration, usize) -> Result<Client>,
    {
        let identity = Identity::random();
        match build(&identity, self.timeout, self.max_connections) {
            Ok(http) => {
                self.http = http;
                self.identity = identity;
                tracing::info!(user_agent = %self.identity.user_agent, "Rotated client identity");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not rotate client identity; keeping the current one");
                false
            }
        }
    }

    /// GETs `url` and returns the body, failing on any non-success status
    pub async fn get_text(&self, url: &str) -> Result<String> {
        // The semaphore is never closed
        let _permit = self.permits.acquire().await.ok();
        tracing::debug!(url, "GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| transport(url, source))?;
        read_body(url, response).await
    }

    /// POSTs a JSON body to `path` on the site, with the search-request headers
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let _permit = self.permits.acquire().await.ok();
        tracing::debug!(url = %url, "POST");

        let response = self
            .http
            .post(&url)
            .header("X-Requested-By", requested_by_token())
            .header(REFERER, format!("{}/", self.base_url))
            .header(ORIGIN, self.base_url.as_str())
            .json(body)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        read_body(&url, response).await
    }
}

/// Builds a reqwest client carrying `identity`
pub fn build_http_client(
    identity: &Identity,
    timeout: Duration,
    max_connections: usize,
) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.6"));

    let client = Client::builder()
        .user_agent(identity.user_agent())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(max_connections)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Request {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|source| transport(url, source))
}

fn transport(url: &str, source: reqwest::Error) -> ScrapeError {
    ScrapeError::Transport {
        url: url.to_string(),
        source,
    }
}
