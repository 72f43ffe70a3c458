//! Core application logic for Lesson Prefetch
//!
//! This module contains the catalog client, the download executor, the
//! storage adapters and the download queue that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lesson_prefetch::app::{
//!     CatalogClient, ClientConfig, ContentSelection, FileBlobStore, HttpDownloadExecutor,
//!     HttpHandler, Language, QueueConfig, QueueManager, QueuePorts, TokenSource,
//! };
//! use lesson_prefetch::app::storage::{BlobStore, DirectoryQuotaSource, QuotaFallback, StorageQuotaEstimator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::with_base_url("https://learn.example.org/api");
//! let base_url = config.parsed_base_url()?;
//! let http = Arc::new(HttpHandler::from_config(&config)?);
//!
//! let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::open("/tmp/lesson-prefetch").await?);
//! let tokens = TokenSource::new(Arc::clone(&store));
//!
//! let ports = QueuePorts {
//!     store: Arc::clone(&store),
//!     quota: StorageQuotaEstimator::new(
//!         Arc::new(DirectoryQuotaSource::new("/tmp/lesson-prefetch", 0)),
//!         QuotaFallback::Deny,
//!     ),
//!     executor: Arc::new(HttpDownloadExecutor::new(
//!         Arc::clone(&http),
//!         tokens.clone(),
//!         Arc::clone(&store),
//!         base_url.clone(),
//!     )),
//!     catalog: CatalogClient::new(http, tokens, base_url),
//! };
//!
//! let manager = QueueManager::new(QueueConfig::default(), ports).await;
//! let content = manager
//!     .get_available_content(&ContentSelection::new("physics", 9, Language::English))
//!     .await?;
//! manager.add_to_queue(content).await?;
//! manager.wait_until_settled().await?;
//! manager.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod executor;
pub mod models;
pub mod queue;
pub mod storage;

// Re-export main public API
pub use client::{CatalogClient, CatalogTransport, ClientConfig, HttpHandler, TokenSource};
pub use executor::{DownloadExecutor, HttpDownloadExecutor, ProgressReporter};
pub use models::{ContentSelection, DownloadableContent, Language};
pub use queue::{
    DownloadQueue, ItemStatus, QueueConfig, QueueItem, QueueManager, QueuePorts, QueueStats,
};
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore, StorageQuota};
