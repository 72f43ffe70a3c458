//! Offline download queue
//!
//! This module holds the queue model, its persisted record and the manager
//! that drives transfers in the background.
//!
//! # Features
//!
//! - **Dedup**: content already in the queue is skipped on enqueue
//! - **Admission control**: a fresh storage quota is checked before every transfer
//! - **Retry policy**: failed attempts return to the back of the queue with
//!   exponential backoff until the retry budget runs out
//! - **Durability**: the whole queue is rewritten to the blob store after each change
//! - **Cancellation**: removing a downloading item stops its transfer at once
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use lesson_prefetch::app::models::DownloadableContent;
//! use lesson_prefetch::app::queue::{ConfigPresets, QueueManager, QueuePorts};
//!
//! # async fn example(
//! #     ports: QueuePorts,
//! #     content: Vec<DownloadableContent>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = QueueManager::new(ConfigPresets::production(), ports).await;
//! let added = manager.add_to_queue(content).await?;
//! println!("Queued {} new item(s)", added.len());
//!
//! for item in manager.get_queue()?.items {
//!     println!("{} {} {}%", item.content.title, item.status, item.progress);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - queue item state machine and the persisted aggregate
//! - [`state`] - in-memory bookkeeping behind the manager's lock
//! - [`store`] - persisted queue record
//! - [`config`] - retry policy and manager configuration
//! - [`manager`] - public API
//! - `driver` - background transfer loop

pub mod config;
mod driver;
pub mod manager;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{ConfigPresets, QueueConfig, QueueConfigBuilder, RetryPolicy};
pub use manager::{QueueManager, QueuePorts};
pub use store::QueueStore;
pub use types::{DownloadQueue, FailureOutcome, ItemStatus, QueueItem, QueueStats};
