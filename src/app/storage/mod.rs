//! Durable storage ports and adapters
//!
//! The queue manager never touches the host's storage primitives directly.
//! It goes through two small capability traits so that alternative hosts and
//! test doubles can be substituted:
//!
//! - [`BlobStore`] - durable key-value blob store holding the queue record,
//!   the bearer token and the downloaded content bytes
//! - [`QuotaSource`] - the host's `{usage, quota}` estimate, wrapped by
//!   [`StorageQuotaEstimator`] into a [`StorageQuota`]
//!
//! # Module Organization
//!
//! - [`file`] - directory-backed blob store with atomic writes
//! - [`memory`] - in-process blob store
//! - [`quota`] - quota estimation and fallback policy
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lesson_prefetch::app::storage::{
//!     BlobStore, DirectoryQuotaSource, FileBlobStore, QuotaFallback, StorageQuotaEstimator,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileBlobStore::open("/tmp/lesson-prefetch").await?;
//! store.put("token", b"secret").await?;
//!
//! let source = Arc::new(DirectoryQuotaSource::new("/tmp/lesson-prefetch", 500 * 1024 * 1024));
//! let estimator = StorageQuotaEstimator::new(source, QuotaFallback::Deny);
//! let quota = estimator.quota().await?;
//! println!("{} of {} bytes used", quota.used, quota.total);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::errors::{StoreError, StoreResult};

pub mod file;
pub mod memory;
pub mod quota;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use quota::{
    DirectoryQuotaSource, FixedQuotaSource, QuotaFallback, QuotaSource, StorageEstimate,
    StorageQuota, StorageQuotaEstimator,
};

/// Durable key-value blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the value stored under `key`
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`; absent keys are not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Total bytes currently held by the store
    async fn usage(&self) -> StoreResult<u64>;
}

/// Reject keys that are empty, absolute or that could escape the store root
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
