//! Shared HTTP plumbing for remote providers.
//!
//! Features:
//! - Token-bucket rate limiting via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Default User-Agent for providers without their own setting.
pub const USER_AGENT: &str = concat!("lyrebird/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A `reqwest` client behind a per-provider rate limiter.
pub struct RateLimitedClient {
    client: reqwest::Client,
    label: &'static str,
    rate_limiter: DirectLimiter,
}

impl RateLimitedClient {
    /// Build a client that issues at most `requests_per_second` requests.
    pub fn new(
        label: &'static str,
        user_agent: &str,
        requests_per_second: u32,
    ) -> anyhow::Result<Self> {
        let rps = NonZeroU32::new(requests_per_second)
            .with_context(|| format!("{label}: requests_per_second must be at least 1"))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .with_context(|| format!("failed to build {label} HTTP client"))?;

        Ok(Self {
            client,
            label,
            rate_limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    ///
    /// Returns `None` for 404 so "no such entity" is not an error.
    pub async fn get(&self, url: &str) -> anyhow::Result<Option<reqwest::Response>> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("{} request failed: {url}", self.label))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    provider = self.label,
                    retry = retries,
                    wait_secs = wait,
                    "Provider returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if resp.status() == StatusCode::NOT_FOUND {
                debug!(provider = self.label, url, "Not found");
                return Ok(None);
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("{} request returned error: {url}", self.label))?;

            return Ok(Some(resp));
        }
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> anyhow::Result<Option<T>> {
        match self.get(url).await? {
            Some(resp) => {
                let body = resp
                    .json::<T>()
                    .await
                    .with_context(|| format!("failed to parse {} response: {url}", self.label))?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }
}

/// Download an image and check that the bytes decode as a known format.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let bytes = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("image download failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("image download returned error: {url}"))?
        .bytes()
        .await
        .with_context(|| format!("failed to read image body: {url}"))?;

    image::guess_format(&bytes).with_context(|| format!("not an image: {url}"))?;
    Ok(bytes.to_vec())
}

/// Build a download client for image URLs.
pub fn download_client(user_agent: &str) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent)
        .build()
        .context("failed to build image download client")
}
