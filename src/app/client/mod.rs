//! Content API client
//!
//! This module talks to the content backend. It is organized into:
//! - `config`: HTTP client configuration and building
//! - `auth`: bearer token storage
//! - `http`: rate-limited request handling shared with the download executor
//!
//! [`CatalogClient`] depends on the [`CatalogTransport`] trait rather than on
//! `reqwest` directly, so tests can substitute a transport that fails or
//! answers without any network.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::app::models::{CatalogResponse, ContentSelection, DownloadableContent};
use crate::constants::api;
use crate::errors::{BoxError, CatalogError, CatalogResult};

pub mod auth;
pub mod config;
pub mod http;

pub use auth::TokenSource;
pub use config::ClientConfig;
pub use http::HttpHandler;

/// Response as seen by the catalog client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase of the status, e.g. `Not Found`
    pub status_text: String,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response seam under the catalog client
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// GET `url`; `Err` means no response was received at all
    async fn get(&self, url: &Url, bearer: Option<&str>) -> Result<TransportResponse, BoxError>;
}

/// Client for the content catalog endpoint
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn CatalogTransport>,
    tokens: TokenSource,
    base_url: Url,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Creates a client over any transport
    ///
    /// `base_url` should end with `/`; see [`ClientConfig::parsed_base_url`].
    pub fn new(transport: Arc<dyn CatalogTransport>, tokens: TokenSource, base_url: Url) -> Self {
        Self {
            transport,
            tokens,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenSource {
        &self.tokens
    }

    /// Build the catalog URL for a selection
    pub fn catalog_url(&self, selection: &ContentSelection) -> CatalogResult<Url> {
        let mut url = self
            .base_url
            .join(api::AVAILABLE_CONTENT_PATH)
            .map_err(|e| CatalogError::InvalidUrl {
                url: format!("{}{}", self.base_url, api::AVAILABLE_CONTENT_PATH),
                error: e.to_string(),
            })?;
        url.query_pairs_mut().extend_pairs(selection.query_pairs());
        Ok(url)
    }

    /// List downloadable content matching `selection`
    ///
    /// Results are not cached.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::FetchFailed`] for a non-success status, with the
    ///   message `Failed to fetch available content: {status text}`
    /// - [`CatalogError::Transport`] when no response arrived; its message is
    ///   the underlying error's message
    /// - [`CatalogError::InvalidBody`] when the body is not `{ content: [...] }`
    pub async fn get_available_content(
        &self,
        selection: &ContentSelection,
    ) -> CatalogResult<Vec<DownloadableContent>> {
        let url = self.catalog_url(selection)?;
        let token = self.bearer_token().await;

        let response = self
            .transport
            .get(&url, token.as_deref())
            .await
            .map_err(CatalogError::Transport)?;

        if !response.is_success() {
            warn!(
                "Catalog request failed: {} {}",
                response.status, response.status_text
            );
            return Err(CatalogError::FetchFailed {
                status: response.status,
                status_text: response.status_text,
            });
        }

        let parsed: CatalogResponse = serde_json::from_slice(&response.body)?;
        debug!(
            "Catalog returned {} item(s) for {}/{}/{}",
            parsed.content.len(),
            selection.subject,
            selection.grade,
            selection.language
        );
        Ok(parsed.content)
    }

    /// Token for the Authorization header, if one can be read
    pub(crate) async fn bearer_token(&self) -> Option<String> {
        match self.tokens.token().await {
            Ok(Some(token)) => Some(token),
            Ok(None) => {
                warn!("No API token stored; sending request without Authorization header");
                None
            }
            Err(e) => {
                warn!("Failed to read API token, sending request without it: {}", e);
                None
            }
        }
    }
}
