//! Internal state management for the download queue
//!
//! This module handles the low-level state operations: dedup on insert,
//! FIFO selection of the next ready item, moving retried items to the back,
//! and tracking the one transfer that may be in flight.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{DownloadQueue, QueueItem};
use crate::app::models::DownloadableContent;

/// Transfer currently owned by the driver
#[derive(Debug)]
pub struct ActiveTransfer {
    pub item_id: String,
    pub cancel: CancellationToken,
}

/// What the driver should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextWork {
    /// Admit this item (id, required bytes)
    Ready { item_id: String, size: u64 },
    /// Only delayed retries remain; wake up at this time
    WaitUntil(DateTime<Utc>),
    /// Nothing pending
    Idle,
}

/// Internal state of the download queue
#[derive(Debug)]
pub struct QueueState {
    queue: DownloadQueue,
    active: Option<ActiveTransfer>,
    last_progress_persist: Option<Instant>,
}

impl QueueState {
    pub fn new(queue: DownloadQueue) -> Self {
        let mut state = Self {
            queue,
            active: None,
            last_progress_persist: None,
        };
        state.queue.refresh_active();
        state
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn snapshot(&self) -> DownloadQueue {
        self.queue.clone()
    }

    /// Append new items, skipping content already queued; returns created ids
    pub fn add_contents(&mut self, contents: Vec<DownloadableContent>) -> Vec<String> {
        let mut added = Vec::new();
        for content in contents {
            if self.queue.contains_content(&content.id) {
                debug!("Skipping duplicate content: {}", content.id);
                continue;
            }
            let item = QueueItem::new(content);
            debug!("Queued content {} as item {}", item.content.id, item.id);
            added.push(item.id.clone());
            self.queue.items.push(item);
        }
        added
    }

    /// Remove an item
    ///
    /// A transfer of the removed item keeps running until
    /// [`release_orphaned_transfer`](Self::release_orphaned_transfer) is called.
    pub fn remove(&mut self, item_id: &str) -> Option<QueueItem> {
        let index = self.queue.items.iter().position(|item| item.id == item_id)?;
        let removed = self.queue.items.remove(index);
        self.queue.refresh_active();
        Some(removed)
    }

    /// Drop every item; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let count = self.queue.items.len();
        self.queue.items.clear();
        self.queue.is_active = false;
        count
    }

    /// Cancel the active transfer if its item is no longer queued
    pub fn release_orphaned_transfer(&mut self) -> bool {
        let orphaned = self
            .active
            .as_ref()
            .is_some_and(|active| self.queue.get(&active.item_id).is_none());
        if orphaned {
            self.cancel_active();
        }
        orphaned
    }

    /// Put back a queue captured before a change that could not be persisted
    pub fn restore(&mut self, queue: DownloadQueue) {
        self.queue = queue;
        self.queue.refresh_active();
    }

    /// Earliest-inserted ready item, or when the next delayed retry is due
    pub fn next_work(&self, now: DateTime<Utc>) -> NextWork {
        if let Some(item) = self.queue.items.iter().find(|item| item.is_ready(now)) {
            return NextWork::Ready {
                item_id: item.id.clone(),
                size: item.content.size,
            };
        }

        self.queue
            .items
            .iter()
            .filter(|item| item.is_pending())
            .filter_map(|item| item.retry_after)
            .min()
            .map_or(NextWork::Idle, NextWork::WaitUntil)
    }

    pub fn get(&self, item_id: &str) -> Option<&QueueItem> {
        self.queue.get(item_id)
    }

    pub fn get_mut(&mut self, item_id: &str) -> Option<&mut QueueItem> {
        self.queue.get_mut(item_id)
    }

    /// Move an item to the end of the list so other pending items go first
    pub fn move_to_back(&mut self, item_id: &str) {
        if let Some(index) = self.queue.items.iter().position(|item| item.id == item_id) {
            let item = self.queue.items.remove(index);
            self.queue.items.push(item);
        }
    }

    /// Mark an item downloading and register its transfer
    pub fn start_transfer(&mut self, item_id: &str, cancel: CancellationToken) -> bool {
        let Some(item) = self.queue.get_mut(item_id) else {
            return false;
        };
        if !item.is_pending() {
            return false;
        }
        item.begin_download();
        self.active = Some(ActiveTransfer {
            item_id: item_id.to_string(),
            cancel,
        });
        self.last_progress_persist = Some(Instant::now());
        self.queue.refresh_active();
        true
    }

    /// Forget the active transfer once its outcome is applied
    pub fn finish_transfer(&mut self) {
        self.active = None;
        self.last_progress_persist = None;
        self.queue.refresh_active();
    }

    pub fn active(&self) -> Option<&ActiveTransfer> {
        self.active.as_ref()
    }

    /// Check whether progress should be persisted now, resetting the throttle if so
    pub fn progress_persist_due(&mut self, interval: std::time::Duration) -> bool {
        let due = self
            .last_progress_persist
            .map_or(true, |last| last.elapsed() >= interval);
        if due {
            self.last_progress_persist = Some(Instant::now());
        }
        due
    }

    /// Reset terminally failed items; returns how many were requeued
    pub fn requeue_failed(&mut self) -> usize {
        let mut count = 0;
        for item in self
            .queue
            .items
            .iter_mut()
            .filter(|item| item.status == super::types::ItemStatus::Failed)
        {
            item.reset_for_retry();
            count += 1;
        }
        count
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Cancelling transfer of item {}", active.item_id);
            active.cancel.cancel();
        }
        self.last_progress_persist = None;
    }
}
