//! Core data structures for the download queue
//!
//! Each [`QueueItem`] is a small state machine:
//!
//! ```text
//! pending -> downloading -> completed
//!                        -> pending   (failed attempt, retries left)
//!                        -> failed    (retries exhausted)
//! pending -> failed                   (insufficient storage)
//! ```
//!
//! Expected outcomes such as a failed attempt are ordinary transitions here,
//! not errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::models::DownloadableContent;
use crate::constants::queue::INSUFFICIENT_STORAGE_ERROR;

/// Status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for the driver
    Pending,
    /// Transfer in flight
    Downloading,
    /// Bytes stored locally
    Completed,
    /// Terminal failure; stays visible until removed
    Failed,
}

impl ItemStatus {
    /// No further automatic transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Item went back to pending
    WillRetry { retry_count: u32 },
    /// Retries exhausted, item is terminally failed
    Exhausted { retry_count: u32 },
}

/// One unit of work: a content descriptor and its transfer state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Item identifier, distinct from the content id
    pub id: String,
    pub content: DownloadableContent,
    pub status: ItemStatus,
    /// Percentage in `0..=100`
    pub progress: u8,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Earliest time a retry may start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Create a pending item with a fresh id
    pub fn new(content: DownloadableContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            status: ItemStatus::Pending,
            progress: 0,
            retry_count: 0,
            created_at: Utc::now(),
            last_error: None,
            retry_after: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ItemStatus::Pending
    }

    pub fn is_downloading(&self) -> bool {
        self.status == ItemStatus::Downloading
    }

    /// Pending and not waiting out a retry delay
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.retry_after.map_or(true, |at| at <= now)
    }

    /// Check whether the last failure was an admission failure
    pub fn is_storage_failure(&self) -> bool {
        self.status == ItemStatus::Failed
            && self
                .last_error
                .as_deref()
                .is_some_and(|e| e.starts_with(INSUFFICIENT_STORAGE_ERROR))
    }

    /// pending -> downloading; progress restarts from zero
    pub fn begin_download(&mut self) {
        debug_assert!(self.is_pending());
        self.status = ItemStatus::Downloading;
        self.progress = 0;
        self.retry_after = None;
    }

    /// Raise progress; lower values and updates outside a transfer are ignored
    pub fn record_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if !self.is_downloading() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    /// downloading -> completed
    pub fn complete(&mut self) {
        self.status = ItemStatus::Completed;
        self.progress = 100;
        self.last_error = None;
        self.retry_after = None;
    }

    /// downloading -> pending or failed, depending on the retry budget
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        max_retries: u32,
        retry_after: Option<DateTime<Utc>>,
    ) -> FailureOutcome {
        self.retry_count += 1;
        self.last_error = Some(error.into());

        if self.retry_count < max_retries {
            self.status = ItemStatus::Pending;
            self.retry_after = retry_after;
            FailureOutcome::WillRetry {
                retry_count: self.retry_count,
            }
        } else {
            self.status = ItemStatus::Failed;
            self.retry_after = None;
            FailureOutcome::Exhausted {
                retry_count: self.retry_count,
            }
        }
    }

    /// pending -> failed because the storage budget cannot hold the item
    pub fn fail_insufficient_storage(&mut self, required: u64, available: Option<u64>) {
        self.status = ItemStatus::Failed;
        self.retry_after = None;
        self.last_error = Some(match available {
            Some(available) => format!(
                "{}: requires {} bytes, {} bytes available",
                INSUFFICIENT_STORAGE_ERROR, required, available
            ),
            None => format!(
                "{}: requires {} bytes, storage estimate unavailable",
                INSUFFICIENT_STORAGE_ERROR, required
            ),
        });
    }

    /// failed -> pending with a fresh retry budget
    pub fn reset_for_retry(&mut self) {
        self.status = ItemStatus::Pending;
        self.progress = 0;
        self.retry_count = 0;
        self.last_error = None;
        self.retry_after = None;
    }

    /// In-flight transfers cannot be resumed after a restart
    pub fn demote_if_downloading(&mut self) -> bool {
        if self.is_downloading() {
            self.status = ItemStatus::Pending;
            true
        } else {
            false
        }
    }
}

/// The single persisted aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQueue {
    /// Items in insertion order
    pub items: Vec<QueueItem>,
    /// True iff some item is downloading
    pub is_active: bool,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn get_mut(&mut self, item_id: &str) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn contains_content(&self, content_id: &str) -> bool {
        self.items.iter().any(|item| item.content.id == content_id)
    }

    /// Check whether nothing remains for the driver to do
    pub fn is_settled(&self) -> bool {
        !self
            .items
            .iter()
            .any(|item| item.is_pending() || item.is_downloading())
    }

    /// Recompute `is_active` from item statuses
    pub fn refresh_active(&mut self) {
        self.is_active = self.items.iter().any(QueueItem::is_downloading);
    }

    /// Counts per status
    pub fn queue_stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.items.len(),
            ..QueueStats::default()
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Downloading => stats.downloading += 1,
                ItemStatus::Completed => {
                    stats.completed += 1;
                    stats.completed_bytes += item.content.size;
                }
                ItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Summary of a queue snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
    pub completed_bytes: u64,
}

impl QueueStats {
    /// Percentage of items that reached a terminal status
    pub fn finished_percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            ((self.completed + self.failed) as f64 / self.total as f64) * 100.0
        }
    }
}
