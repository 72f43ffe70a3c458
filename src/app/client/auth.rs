//! Bearer token storage
//!
//! The token is an opaque string issued elsewhere. It lives in the blob
//! store under the `token` key and is attached to every API request.

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::storage::BlobStore;
use crate::constants::keys;
use crate::errors::StoreResult;

/// Reads and writes the bearer token in a [`BlobStore`]
#[derive(Clone)]
pub struct TokenSource {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource").finish_non_exhaustive()
    }
}

impl TokenSource {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Current token; empty or whitespace-only values count as absent
    pub async fn token(&self) -> StoreResult<Option<String>> {
        let Some(bytes) = self.store.get(keys::TOKEN).await? else {
            return Ok(None);
        };
        let token = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok((!token.is_empty()).then_some(token))
    }

    /// Store a new token, replacing any previous one
    pub async fn set_token(&self, token: &str) -> StoreResult<()> {
        self.store.put(keys::TOKEN, token.trim().as_bytes()).await?;
        info!("Stored API token");
        Ok(())
    }

    /// Remove the stored token
    pub async fn clear(&self) -> StoreResult<()> {
        self.store.delete(keys::TOKEN).await?;
        debug!("Cleared API token");
        Ok(())
    }
}

/// Mask a token for display, keeping only its first characters
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}{}", visible, "*".repeat(token.chars().count().saturating_sub(4).min(12)))
}
