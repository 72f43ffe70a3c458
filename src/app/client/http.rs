//! Core HTTP operations with rate limiting
//!
//! One [`HttpHandler`] is shared by the catalog client and the download
//! executor so both draw from the same connection pool and request budget.
//! Retries are not done here: catalog failures go straight back to the
//! caller and transfer retries belong to the queue's retry policy.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use url::Url;

use super::config::ClientConfig;
use super::{CatalogTransport, TransportResponse};
use crate::errors::{BoxError, ConfigError};

/// HTTP operations handler with a shared rate limiter
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> Result<Self, ConfigError> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Build the client and handler from a [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::new(config.build_http_client()?, config.rate_limit_rps)
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> Result<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>, ConfigError>
    {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "client.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Send a GET request, with a bearer token when one is given
    ///
    /// The response is returned whatever its status; callers decide what a
    /// non-success status means for them.
    pub async fn get_response(
        &self,
        url: &Url,
        bearer: Option<&str>,
    ) -> reqwest::Result<reqwest::Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut request = self.client.get(url.as_str());
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        tracing::debug!("GET {} -> {}", url, response.status());
        Ok(response)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl CatalogTransport for HttpHandler {
    async fn get(&self, url: &Url, bearer: Option<&str>) -> Result<TransportResponse, BoxError> {
        let response = self.get_response(url, bearer).await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}
