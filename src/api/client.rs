//! WikiTree HTTP client
//!
//! This module handles all requests to the WikiTree API, including:
//! - Building the HTTP client with a descriptive user agent
//! - Process-wide rate limiting between requests
//! - Retry with exponential backoff for transport failures
//! - Honoring `Retry-After` on HTTP 429
//! - Classifying responses into `ApiError`

use crate::api::profile::{
    decode_profile_list_response, decode_profile_response, ANCESTOR_FIELDS, DESCENDANT_FIELDS,
    PROFILE_FIELDS,
};
use crate::api::rate_limit::RateLimiter;
use crate::api::{Profile, ProfileSource};
use crate::config::{ApiConfig, CrawlerConfig};
use crate::{ApiError, ApiResult, ConfigError, CrawlerError};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Wait applied to a 429 response that carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Outcome of one HTTP attempt
enum AttemptError {
    /// HTTP 429; wait this long before trying again
    RateLimited(Duration),
    Failed(ApiError),
}

/// Rate-limited WikiTree API client
#[derive(Debug)]
pub struct WikiTreeClient {
    http: Client,
    endpoint: Url,
    app_id: String,
    limiter: RateLimiter,
    request_delay: Duration,
    max_retries: u32,
    max_retry_after: Duration,
    requests: AtomicU64,
}

impl WikiTreeClient {
    /// Creates a client from the API and crawler sections of the config
    pub fn new(api: &ApiConfig, crawler: &CrawlerConfig) -> Result<Self, CrawlerError> {
        let endpoint = Url::parse(&api.endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api.endpoint: {}", e)))?;
        let request_delay = Duration::from_millis(crawler.request_delay_ms);

        Ok(Self {
            http: build_http_client(api)?,
            endpoint,
            app_id: api.app_id.clone(),
            limiter: RateLimiter::new(request_delay),
            request_delay,
            max_retries: crawler.max_retries,
            max_retry_after: Duration::from_secs(crawler.max_retry_after_secs),
            requests: AtomicU64::new(0),
        })
    }

    fn build_url(&self, action: &str, key: &str, extra: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("action", action)
                .append_pair("appId", &self.app_id)
                .append_pair("format", "json")
                .append_pair("key", key);
            for (name, value) in extra {
                query.append_pair(name, value);
            }
        }
        url
    }

    /// Cooldown applied after any failed attempt
    fn failure_cooldown(&self) -> Duration {
        self.request_delay.saturating_mul(2)
    }

    /// Backoff before retry number `attempt` (0-based)
    fn backoff(&self, attempt: u32) -> Duration {
        self.request_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Sends a request, retrying per the client's policy, and returns the JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 429 | Sleep `Retry-After` (clamped), retry without limit |
    /// | Network error | Retry up to `max_retries`, exponential backoff |
    /// | Other non-2xx | Immediate → `ApiError::Status` |
    /// | Undecodable body | Immediate → `ApiError::InvalidResponse` |
    async fn call(&self, action: &str, key: &str, extra: &[(&str, String)]) -> ApiResult<Value> {
        let url = self.build_url(action, key, extra);
        let mut attempt: u32 = 0;

        loop {
            self.limiter.acquire().await;

            match self.send_once(&url).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::RateLimited(wait)) => {
                    warn!(
                        action = action,
                        key = key,
                        wait_secs = wait.as_secs(),
                        "Rate limited by WikiTree, waiting before retry"
                    );
                    self.limiter.cooldown(self.failure_cooldown()).await;
                    tokio::time::sleep(wait).await;
                }
                Err(AttemptError::Failed(err)) => {
                    self.limiter.cooldown(self.failure_cooldown()).await;

                    if !err.is_retryable() || attempt >= self.max_retries {
                        return Err(err);
                    }

                    let backoff = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        action = action,
                        key = key,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed: {}",
                        err
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn send_once(&self, url: &Url) -> Result<Value, AttemptError> {
        debug!(url = %url, "Sending WikiTree request");

        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AttemptError::Failed(ApiError::Network(e.to_string())))?;

        self.requests.fetch_add(1, Ordering::Relaxed);

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::RateLimited(
                self.retry_after(&response).min(self.max_retry_after),
            ));
        }

        if !status.is_success() {
            return Err(AttemptError::Failed(ApiError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            }));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                AttemptError::Failed(ApiError::InvalidResponse(e.to_string()))
            } else {
                AttemptError::Failed(ApiError::Network(e.to_string()))
            }
        })
    }

    /// Reads `Retry-After` as whole seconds
    fn retry_after(&self, response: &Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER)
    }
}

impl ProfileSource for WikiTreeClient {
    async fn get_profile(&self, wiki_id: &str) -> ApiResult<Profile> {
        let body = self
            .call("getProfile", wiki_id, &[("fields", PROFILE_FIELDS.to_string())])
            .await?;
        decode_profile_response(wiki_id, body)
    }

    async fn get_descendants(&self, wiki_id: &str, depth: u32) -> ApiResult<Vec<Profile>> {
        let body = self
            .call(
                "getDescendants",
                wiki_id,
                &[
                    ("depth", depth.to_string()),
                    ("fields", DESCENDANT_FIELDS.to_string()),
                ],
            )
            .await?;
        decode_profile_list_response("descendants", body)
    }

    async fn get_ancestors(&self, wiki_id: &str, depth: u32) -> ApiResult<Vec<Profile>> {
        let body = self
            .call(
                "getAncestors",
                wiki_id,
                &[
                    ("depth", depth.to_string()),
                    ("fields", ANCESTOR_FIELDS.to_string()),
                ],
            )
            .await?;
        decode_profile_list_response("ancestors", body)
    }

    fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
