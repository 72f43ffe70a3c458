//! Queue manager: the public face of the download queue
//!
//! A [`QueueManager`] is an explicit instance built from injected ports
//! ([`QueuePorts`]). It owns the in-memory queue behind one async mutex,
//! persists the record before any mutation returns and runs a single
//! background driver task that performs at most one transfer at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::QueueConfig;
use super::driver;
use super::state::QueueState;
use super::store::QueueStore;
use super::types::DownloadQueue;
use crate::app::client::CatalogClient;
use crate::app::executor::DownloadExecutor;
use crate::app::models::{ContentSelection, DownloadableContent};
use crate::app::storage::{BlobStore, StorageQuota, StorageQuotaEstimator};
use crate::errors::{QueueError, QueueResult, StoreResult};

/// External collaborators of the queue manager
#[derive(Clone)]
pub struct QueuePorts {
    /// Durable store holding the queue record
    pub store: Arc<dyn BlobStore>,
    /// Storage budget used for admission control
    pub quota: StorageQuotaEstimator,
    /// Performs individual transfers
    pub executor: Arc<dyn DownloadExecutor>,
    /// Lists available content
    pub catalog: CatalogClient,
}

/// State shared between the manager handle and the driver task
pub(super) struct Shared {
    pub(super) config: QueueConfig,
    pub(super) state: Mutex<QueueState>,
    pub(super) store: QueueStore,
    pub(super) quota: StorageQuotaEstimator,
    pub(super) executor: Arc<dyn DownloadExecutor>,
    pub(super) snapshots: watch::Sender<DownloadQueue>,
    pub(super) wake: Notify,
    pub(super) shutdown: CancellationToken,
    destroyed: AtomicBool,
}

impl Shared {
    /// Write the record, publishing the snapshot once the write succeeded;
    /// the caller holds the state lock
    pub(super) async fn persist(&self, state: &QueueState) -> StoreResult<()> {
        let snapshot = state.snapshot();
        self.store.save(&snapshot).await?;
        self.snapshots.send_replace(snapshot);
        Ok(())
    }

    /// Persist a change made since `before` was captured, or undo it
    ///
    /// On a failed write the state is rolled back to `before`, so the caller
    /// sees an error and the queue looks as if the call never happened.
    async fn commit(&self, state: &mut QueueState, before: DownloadQueue) -> QueueResult<()> {
        if let Err(e) = self.persist(state).await {
            warn!("Failed to persist download queue, change rolled back: {}", e);
            state.restore(before);
            return Err(e.into());
        }
        if state.release_orphaned_transfer() {
            debug!("Cancelled transfer of a removed item");
        }
        Ok(())
    }

    /// Publish the snapshot without writing it
    pub(super) fn publish(&self, state: &QueueState) {
        self.snapshots.send_replace(state.snapshot());
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Offline download queue
///
/// # Examples
///
/// ```rust,no_run
/// use lesson_prefetch::app::models::{ContentSelection, Language};
/// use lesson_prefetch::app::queue::{QueueConfig, QueueManager, QueuePorts};
///
/// # async fn example(ports: QueuePorts) -> Result<(), Box<dyn std::error::Error>> {
/// let manager = QueueManager::new(QueueConfig::default(), ports).await;
///
/// let selection = ContentSelection::new("physics", 9, Language::Bangla);
/// let content = manager.get_available_content(&selection).await?;
/// manager.add_to_queue(content).await?;
///
/// let queue = manager.wait_until_settled().await?;
/// println!("{} item(s) processed", queue.len());
/// manager.destroy().await;
/// # Ok(())
/// # }
/// ```
pub struct QueueManager {
    shared: Arc<Shared>,
    catalog: CatalogClient,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("config", &self.shared.config)
            .field("destroyed", &self.shared.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl QueueManager {
    /// Load the persisted queue and, unless disabled, start the driver
    pub async fn new(config: QueueConfig, ports: QueuePorts) -> Self {
        let store = QueueStore::new(ports.store);
        let queue = store.load().await;
        info!("Download queue loaded with {} item(s)", queue.len());

        let (snapshots, _) = watch::channel(queue.clone());
        let autostart = config.autostart;

        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(QueueState::new(queue)),
            store,
            quota: ports.quota,
            executor: ports.executor,
            snapshots,
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            destroyed: AtomicBool::new(false),
        });

        let driver = autostart.then(|| Self::spawn_driver(&shared));

        Self {
            shared,
            catalog: ports.catalog,
            driver: Mutex::new(driver),
        }
    }

    /// Start the background driver if it is not running yet
    pub async fn start(&self) -> QueueResult<()> {
        self.ensure_alive()?;
        let mut handle = self.driver.lock().await;
        if handle.is_none() {
            *handle = Some(Self::spawn_driver(&self.shared));
        }
        Ok(())
    }

    fn spawn_driver(shared: &Arc<Shared>) -> JoinHandle<()> {
        debug!("Spawning queue driver");
        tokio::spawn(driver::run(Arc::clone(shared)))
    }

    /// Whether the background driver has been started
    pub async fn is_running(&self) -> bool {
        self.driver
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// List downloadable content for `selection`; results are not cached
    pub async fn get_available_content(
        &self,
        selection: &ContentSelection,
    ) -> QueueResult<Vec<DownloadableContent>> {
        self.ensure_alive()?;
        Ok(self.catalog.get_available_content(selection).await?)
    }

    /// Append content to the queue, skipping content ids already present
    ///
    /// Returns the ids of the newly created items. The record is persisted
    /// before this resolves; transfers happen later on the driver.
    pub async fn add_to_queue(&self, contents: Vec<DownloadableContent>) -> QueueResult<Vec<String>> {
        let mut state = self.lock_alive().await?;
        let before = state.snapshot();
        let added = state.add_contents(contents);
        if added.is_empty() {
            return Ok(added);
        }

        self.shared.commit(&mut state, before).await?;
        drop(state);

        info!("Added {} item(s) to the download queue", added.len());
        self.shared.wake.notify_one();
        Ok(added)
    }

    /// Remove an item, cancelling its transfer if it is downloading
    ///
    /// Returns whether an item was removed; unknown ids are a no-op.
    pub async fn remove_from_queue(&self, item_id: &str) -> QueueResult<bool> {
        let mut state = self.lock_alive().await?;
        let before = state.snapshot();
        let Some(removed) = state.remove(item_id) else {
            debug!("Remove ignored, no queue item {}", item_id);
            return Ok(false);
        };

        self.shared.commit(&mut state, before).await?;
        drop(state);

        info!("Removed '{}' from the download queue", removed.content.title);
        self.shared.wake.notify_one();
        Ok(true)
    }

    /// Remove every item and cancel any transfer; returns how many were removed
    pub async fn clear_queue(&self) -> QueueResult<usize> {
        let mut state = self.lock_alive().await?;
        let before = state.snapshot();
        let removed = state.clear();
        self.shared.commit(&mut state, before).await?;
        drop(state);

        info!("Cleared {} item(s) from the download queue", removed);
        Ok(removed)
    }

    /// Give terminally failed items a fresh retry budget
    pub async fn retry_failed(&self) -> QueueResult<usize> {
        let mut state = self.lock_alive().await?;
        let before = state.snapshot();
        let requeued = state.requeue_failed();
        if requeued == 0 {
            return Ok(0);
        }

        self.shared.commit(&mut state, before).await?;
        drop(state);

        info!("Requeued {} failed item(s)", requeued);
        self.shared.wake.notify_one();
        Ok(requeued)
    }

    /// Owned snapshot of the queue
    pub fn get_queue(&self) -> QueueResult<DownloadQueue> {
        self.ensure_alive()?;
        Ok(self.shared.snapshots.borrow().clone())
    }

    /// Receiver of queue snapshots, updated after every change
    pub fn subscribe(&self) -> QueueResult<watch::Receiver<DownloadQueue>> {
        self.ensure_alive()?;
        Ok(self.shared.snapshots.subscribe())
    }

    /// Wait until no item is pending or downloading
    ///
    /// Never resolves on its own while the driver is not started.
    pub async fn wait_until_settled(&self) -> QueueResult<DownloadQueue> {
        let mut receiver = self.subscribe()?;
        loop {
            {
                let queue = receiver.borrow_and_update();
                if queue.is_settled() {
                    return Ok(queue.clone());
                }
            }

            tokio::select! {
                _ = self.shared.shutdown.cancelled() => return Err(QueueError::Destroyed),
                changed = receiver.changed() => {
                    if changed.is_err() {
                        return Err(QueueError::Destroyed);
                    }
                }
            }
        }
    }

    /// Whether `required_bytes` fits into a freshly computed quota
    ///
    /// An unavailable estimate counts as not fitting.
    pub async fn check_storage_space(&self, required_bytes: u64) -> QueueResult<bool> {
        self.ensure_alive()?;
        Ok(driver::fits(&self.shared.quota, required_bytes)
            .await
            .is_ok())
    }

    /// Freshly computed storage quota
    pub async fn get_storage_quota(&self) -> QueueResult<StorageQuota> {
        self.ensure_alive()?;
        Ok(self.shared.quota.quota().await?)
    }

    /// Configuration the manager was built with
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Stop the driver and cancel any transfer
    ///
    /// Once this returns the queue record no longer changes and every other
    /// operation fails with [`QueueError::Destroyed`]. Calling it again is a
    /// no-op.
    pub async fn destroy(&self) {
        {
            let _state = self.shared.state.lock().await;
            if self.shared.destroyed.swap(true, Ordering::SeqCst) {
                return;
            }
            self.shared.shutdown.cancel();
        }

        if let Some(handle) = self.driver.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Queue driver ended abnormally: {}", e);
            }
        }
        info!("Download queue destroyed");
    }

    fn ensure_alive(&self) -> QueueResult<()> {
        if self.shared.is_destroyed() {
            Err(QueueError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Lock the state, re-checking liveness under the lock
    async fn lock_alive(&self) -> QueueResult<tokio::sync::MutexGuard<'_, QueueState>> {
        self.ensure_alive()?;
        let state = self.shared.state.lock().await;
        self.ensure_alive()?;
        Ok(state)
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}
