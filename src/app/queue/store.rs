//! Persisted queue record
//!
//! The whole [`DownloadQueue`] is stored as one JSON record under the
//! `download-queue` key and rewritten after every mutation. The queue manager
//! is the only writer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::DownloadQueue;
use crate::app::storage::BlobStore;
use crate::constants::keys;
use crate::errors::StoreResult;

/// Reads and writes the queue record in a [`BlobStore`]
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore").finish_non_exhaustive()
    }
}

impl QueueStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Load the queue record
    ///
    /// A missing, unreadable or corrupt record yields an empty queue; no live
    /// state exists yet at load time. Items found `downloading` are demoted to
    /// `pending` because their transfers died with the previous process.
    pub async fn load(&self) -> DownloadQueue {
        let bytes = match self.store.get(keys::DOWNLOAD_QUEUE).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No persisted download queue found");
                return DownloadQueue::new();
            }
            Err(e) => {
                warn!("Failed to read persisted download queue, starting empty: {}", e);
                return DownloadQueue::new();
            }
        };

        let mut queue = match Self::decode(&bytes) {
            Some(queue) => queue,
            None => return DownloadQueue::new(),
        };

        let demoted = queue
            .items
            .iter_mut()
            .map(|item| item.demote_if_downloading())
            .filter(|demoted| *demoted)
            .count();
        queue.refresh_active();

        if demoted > 0 {
            info!("Demoted {} interrupted download(s) back to pending", demoted);
        }
        debug!("Loaded download queue with {} item(s)", queue.items.len());
        queue
    }

    /// Write the queue record
    pub async fn save(&self, queue: &DownloadQueue) -> StoreResult<()> {
        let bytes = Self::encode(queue)?;
        self.store.put(keys::DOWNLOAD_QUEUE, &bytes).await
    }

    pub fn encode(queue: &DownloadQueue) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(queue)?)
    }

    /// Parse a record, logging and discarding anything malformed
    pub fn decode(bytes: &[u8]) -> Option<DownloadQueue> {
        match serde_json::from_slice::<DownloadQueue>(bytes) {
            Ok(queue) => Some(queue),
            Err(e) => {
                warn!("Persisted download queue is corrupt, resetting to empty: {}", e);
                None
            }
        }
    }
}
