//! Streaming HTTP download executor
//!
//! Fetches `GET {base}/content/{id}/download` with the bearer token, streams
//! the body while reporting progress, checks the byte count and stores the
//! result in the blob store under `content/{id}`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{DownloadExecutor, ProgressReporter};
use crate::app::client::{HttpHandler, TokenSource};
use crate::app::queue::QueueItem;
use crate::app::storage::BlobStore;
use crate::constants::{api, keys};
use crate::errors::{TransferError, TransferResult};

/// Download executor over the shared [`HttpHandler`]
#[derive(Clone)]
pub struct HttpDownloadExecutor {
    http: Arc<HttpHandler>,
    tokens: TokenSource,
    store: Arc<dyn BlobStore>,
    base_url: Url,
}

impl std::fmt::Debug for HttpDownloadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloadExecutor")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpDownloadExecutor {
    pub fn new(
        http: Arc<HttpHandler>,
        tokens: TokenSource,
        store: Arc<dyn BlobStore>,
        base_url: Url,
    ) -> Self {
        Self {
            http,
            tokens,
            store,
            base_url,
        }
    }

    /// Transfer endpoint for one content id
    ///
    /// The id always lands in a single path segment under the base URL.
    /// Ids `.` and `..` cannot be addressed that way and are rejected.
    pub fn download_url(&self, content_id: &str) -> TransferResult<Url> {
        if matches!(content_id, "" | "." | "..") {
            return Err(TransferError::Other(format!(
                "Content id '{}' cannot be used in a download URL",
                content_id
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransferError::Other(format!("Base URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(api::download_segments(content_id));
        Ok(url)
    }

    async fn bearer_token(&self) -> Option<String> {
        match self.tokens.token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read API token, downloading without it: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DownloadExecutor for HttpDownloadExecutor {
    async fn execute(
        &self,
        item: &QueueItem,
        mut progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> TransferResult<()> {
        let content = &item.content;
        let url = self.download_url(&content.id)?;
        let token = self.bearer_token().await;

        info!("Downloading '{}' ({} bytes)", content.title, content.size);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            response = self.http.get_response(&url, token.as_deref()) => response?,
        };

        if !response.status().is_success() {
            return Err(TransferError::ServerError {
                status: response.status().as_u16(),
            });
        }

        let expected = response.content_length().unwrap_or(content.size);
        let mut buffer = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Transfer of {} cancelled after {} bytes", content.id, buffer.len());
                    return Err(TransferError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(chunk) => {
                    buffer.extend_from_slice(&chunk?);
                    progress.report_bytes(buffer.len() as u64, expected);
                }
                None => break,
            }
        }

        let actual = buffer.len() as u64;
        if actual != expected {
            return Err(TransferError::SizeMismatch { expected, actual });
        }

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        self.store.put(&keys::content(&content.id), &buffer).await?;

        info!("Stored '{}' under {}", content.title, keys::content(&content.id));
        Ok(())
    }
}
