//! Storage quota estimation
//!
//! The host reports `{usage, quota}` for the shared storage budget. Hosts that
//! cannot report it are handled by an explicit [`QuotaFallback`] policy
//! instead of silently assuming space is available.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::file::FileBlobStore;
use crate::errors::{QuotaError, QuotaResult};

/// Raw estimate as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    /// Bytes in use
    pub usage: u64,
    /// Bytes granted in total
    pub quota: u64,
}

/// Derived view of the storage budget; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageQuota {
    pub used: u64,
    pub total: u64,
    /// `max(0, total - used)`
    pub available: u64,
    /// `round(used / total * 100)`, 0 when `total` is 0
    pub percentage: u32,
}

impl StorageQuota {
    pub fn from_estimate(estimate: StorageEstimate) -> Self {
        let StorageEstimate { usage, quota } = estimate;
        let percentage = if quota == 0 {
            0
        } else {
            ((usage as f64 / quota as f64) * 100.0).round() as u32
        };

        Self {
            used: usage,
            total: quota,
            available: quota.saturating_sub(usage),
            percentage,
        }
    }

    /// Quota used when the host cannot report one and the policy allows it
    pub fn unbounded() -> Self {
        Self {
            used: 0,
            total: u64::MAX,
            available: u64::MAX,
            percentage: 0,
        }
    }

    /// Check whether `required_bytes` fits into the remaining space
    pub fn can_fit(&self, required_bytes: u64) -> bool {
        required_bytes <= self.available
    }
}

/// What to do when the host offers no storage estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaFallback {
    /// Treat storage as unlimited
    Unbounded,
    /// Report the quota as unavailable; admission then fails for every item
    #[default]
    Deny,
}

/// Host storage-usage primitive
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Current estimate, or `None` when the host has no such primitive
    async fn estimate(&self) -> Option<StorageEstimate>;
}

/// Quota estimator applying the fallback policy on top of a [`QuotaSource`]
#[derive(Clone)]
pub struct StorageQuotaEstimator {
    source: Arc<dyn QuotaSource>,
    fallback: QuotaFallback,
}

impl std::fmt::Debug for StorageQuotaEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageQuotaEstimator")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl StorageQuotaEstimator {
    pub fn new(source: Arc<dyn QuotaSource>, fallback: QuotaFallback) -> Self {
        Self { source, fallback }
    }

    pub fn fallback(&self) -> QuotaFallback {
        self.fallback
    }

    /// Compute a fresh quota; nothing is cached between calls
    pub async fn quota(&self) -> QuotaResult<StorageQuota> {
        match self.source.estimate().await {
            Some(estimate) => {
                let quota = StorageQuota::from_estimate(estimate);
                debug!(
                    "Storage quota: {} / {} bytes used ({}%)",
                    quota.used, quota.total, quota.percentage
                );
                Ok(quota)
            }
            None => match self.fallback {
                QuotaFallback::Unbounded => {
                    warn!("Storage estimate unavailable; treating storage as unbounded");
                    Ok(StorageQuota::unbounded())
                }
                QuotaFallback::Deny => {
                    error!("Storage estimate unavailable; refusing to admit downloads");
                    Err(QuotaError::Unavailable)
                }
            },
        }
    }
}

/// Estimate derived from a data directory and the free space of its volume
///
/// `usage` is the size of everything under the directory. `quota` is the
/// configured budget, capped by what the disk can actually still hold; a
/// budget of 0 means only the disk bounds the quota.
#[derive(Debug, Clone)]
pub struct DirectoryQuotaSource {
    root: PathBuf,
    budget_bytes: u64,
}

impl DirectoryQuotaSource {
    pub fn new(root: impl AsRef<Path>, budget_bytes: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            budget_bytes,
        }
    }

    fn estimate_blocking(root: &Path, budget_bytes: u64) -> std::io::Result<StorageEstimate> {
        let usage = FileBlobStore::directory_size(root)?;
        let free = fs2::available_space(root)?;
        let disk_bound = usage.saturating_add(free);
        let quota = if budget_bytes == 0 {
            disk_bound
        } else {
            budget_bytes.min(disk_bound)
        };
        Ok(StorageEstimate { usage, quota })
    }
}

#[async_trait]
impl QuotaSource for DirectoryQuotaSource {
    async fn estimate(&self) -> Option<StorageEstimate> {
        let root = self.root.clone();
        let budget = self.budget_bytes;
        match tokio::task::spawn_blocking(move || Self::estimate_blocking(&root, budget)).await {
            Ok(Ok(estimate)) => Some(estimate),
            Ok(Err(e)) => {
                warn!(
                    "Failed to estimate storage for {}: {}",
                    self.root.display(),
                    e
                );
                None
            }
            Err(e) => {
                warn!("Storage estimate task failed: {}", e);
                None
            }
        }
    }
}

/// Estimate with fixed, adjustable numbers
///
/// Used on hosts that report a known budget and by tests.
#[derive(Debug, Default)]
pub struct FixedQuotaSource {
    usage: AtomicU64,
    quota: AtomicU64,
    available: AtomicBool,
}

impl FixedQuotaSource {
    pub fn new(usage: u64, quota: u64) -> Self {
        Self {
            usage: AtomicU64::new(usage),
            quota: AtomicU64::new(quota),
            available: AtomicBool::new(true),
        }
    }

    /// Source that behaves like a host without the estimate primitive
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_usage(&self, usage: u64) {
        self.usage.store(usage, Ordering::SeqCst);
    }

    pub fn add_usage(&self, bytes: u64) {
        self.usage.fetch_add(bytes, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuotaSource for FixedQuotaSource {
    async fn estimate(&self) -> Option<StorageEstimate> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(StorageEstimate {
            usage: self.usage.load(Ordering::SeqCst),
            quota: self.quota.load(Ordering::SeqCst),
        })
    }
}
