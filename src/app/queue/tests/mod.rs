//! Scenario tests for the queue manager
//!
//! The manager runs against in-process fakes: a memory blob store, a fixed
//! quota source and a scripted executor whose behaviour is chosen per
//! content id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::*;
use crate::app::client::{CatalogClient, CatalogTransport, TokenSource, TransportResponse};
use crate::app::executor::{DownloadExecutor, ProgressReporter};
use crate::app::models::fixtures::content;
use crate::app::storage::{
    BlobStore, FixedQuotaSource, MemoryBlobStore, QuotaFallback, StorageQuotaEstimator,
};
use crate::constants::{keys, storage::MIB};
use crate::errors::{
    BoxError, QueueError, StoreError, StoreResult, TransferError, TransferResult,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    FailTimes(u32),
    AlwaysFail,
    /// Waits for cancellation
    Hang,
    /// Ignores cancellation and succeeds after a pause
    FinishLate,
}

#[derive(Default)]
struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    attempts: std::sync::Mutex<Vec<String>>,
    quota: Option<Arc<FixedQuotaSource>>,
}

impl ScriptedExecutor {
    fn with(mut self, content_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(content_id.to_string(), behavior);
        self
    }

    fn consuming(mut self, quota: Arc<FixedQuotaSource>) -> Self {
        self.quota = Some(quota);
        self
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        item: &QueueItem,
        mut progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> TransferResult<()> {
        let id = item.content.id.clone();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(id.clone());
            attempts.iter().filter(|seen| **seen == id).count() as u32
        };

        progress.report_percent(50);
        tokio::task::yield_now().await;

        match self.behaviors.get(&id).copied().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => {}
            Behavior::FailTimes(times) if attempt <= times => {
                return Err(TransferError::Other(format!("attempt {} failed", attempt)));
            }
            Behavior::FailTimes(_) => {}
            Behavior::AlwaysFail => return Err(TransferError::ServerError { status: 503 }),
            Behavior::Hang => {
                cancel.cancelled().await;
                return Err(TransferError::Cancelled);
            }
            Behavior::FinishLate => tokio::time::sleep(Duration::from_millis(100)).await,
        }

        if let Some(quota) = &self.quota {
            quota.add_usage(item.content.size);
        }
        Ok(())
    }
}

struct OfflineTransport;

#[async_trait]
impl CatalogTransport for OfflineTransport {
    async fn get(&self, _url: &Url, _bearer: Option<&str>) -> Result<TransportResponse, BoxError> {
        Err(Box::new(std::io::Error::other("Network error")))
    }
}

/// Memory store whose writes can be switched to fail like a full disk
#[derive(Default)]
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_writes: AtomicBool,
}

impl FlakyBlobStore {
    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn usage(&self) -> StoreResult<u64> {
        self.inner.usage().await
    }
}

struct Harness {
    manager: QueueManager,
    store: Arc<dyn BlobStore>,
    executor: Arc<ScriptedExecutor>,
}

impl Harness {
    async fn new(executor: ScriptedExecutor, quota: Arc<FixedQuotaSource>) -> Self {
        Self::with_config(ConfigPresets::testing(), executor, quota).await
    }

    async fn with_config(
        config: QueueConfig,
        executor: ScriptedExecutor,
        quota: Arc<FixedQuotaSource>,
    ) -> Self {
        Self::with_store(config, executor, quota, Arc::new(MemoryBlobStore::new())).await
    }

    async fn with_store(
        config: QueueConfig,
        executor: ScriptedExecutor,
        quota: Arc<FixedQuotaSource>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let executor = Arc::new(executor);
        let catalog = CatalogClient::new(
            Arc::new(OfflineTransport),
            TokenSource::new(store.clone()),
            Url::parse("http://localhost/api/").unwrap(),
        );
        let ports = QueuePorts {
            store: store.clone(),
            quota: StorageQuotaEstimator::new(quota, config.quota_fallback),
            executor: executor.clone(),
            catalog,
        };

        Self {
            manager: QueueManager::new(config, ports).await,
            store,
            executor,
        }
    }

    async fn settle(&self) -> DownloadQueue {
        tokio::time::timeout(SETTLE_TIMEOUT, self.manager.wait_until_settled())
            .await
            .expect("queue did not settle in time")
            .unwrap()
    }

    async fn persisted(&self) -> Option<DownloadQueue> {
        let bytes = self.store.get(keys::DOWNLOAD_QUEUE).await.unwrap()?;
        QueueStore::decode(&bytes)
    }

    async fn wait_for_downloading(&self) -> String {
        let mut receiver = self.manager.subscribe().unwrap();
        let wait = async {
            loop {
                if let Some(item) = receiver
                    .borrow_and_update()
                    .items
                    .iter()
                    .find(|item| item.is_downloading())
                {
                    return item.id.clone();
                }
                receiver.changed().await.unwrap();
            }
        };
        tokio::time::timeout(SETTLE_TIMEOUT, wait)
            .await
            .expect("no item started downloading")
    }
}

fn roomy_quota() -> Arc<FixedQuotaSource> {
    Arc::new(FixedQuotaSource::new(0, 1024 * MIB))
}

fn status_of(queue: &DownloadQueue, content_id: &str) -> ItemStatus {
    queue
        .items
        .iter()
        .find(|item| item.content.id == content_id)
        .map(|item| item.status)
        .unwrap()
}

#[tokio::test]
async fn test_idempotent_enqueue() {
    let harness = Harness::with_config(
        QueueConfigBuilder::new().autostart(false).build(),
        ScriptedExecutor::default(),
        roomy_quota(),
    )
    .await;

    let first = harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    let second = harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(harness.manager.get_queue().unwrap().len(), 1);
    assert_eq!(harness.persisted().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_enqueued_item_defaults() {
    let harness = Harness::with_config(
        QueueConfigBuilder::new().autostart(false).build(),
        ScriptedExecutor::default(),
        roomy_quota(),
    )
    .await;

    let ids = harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    let queue = harness.manager.get_queue().unwrap();
    let item = &queue.items[0];

    assert_eq!(item.id, ids[0]);
    assert_ne!(item.id, item.content.id);
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.progress, 0);
    assert_eq!(item.retry_count, 0);
}

#[tokio::test]
async fn test_remove_and_unknown_remove() {
    let harness = Harness::with_config(
        QueueConfigBuilder::new().autostart(false).build(),
        ScriptedExecutor::default(),
        roomy_quota(),
    )
    .await;

    let ids = harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    assert!(!harness.manager.remove_from_queue("unknown").await.unwrap());
    assert_eq!(harness.manager.get_queue().unwrap().len(), 1);

    assert!(harness.manager.remove_from_queue(&ids[0]).await.unwrap());
    assert!(harness.manager.get_queue().unwrap().is_empty());
    assert!(harness.persisted().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_is_detached() {
    let harness = Harness::with_config(
        QueueConfigBuilder::new().autostart(false).build(),
        ScriptedExecutor::default(),
        roomy_quota(),
    )
    .await;
    harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();

    let mut snapshot = harness.manager.get_queue().unwrap();
    snapshot.items.clear();

    assert_eq!(harness.manager.get_queue().unwrap().len(), 1);
}

#[tokio::test]
async fn test_quota_and_admission_boundary() {
    let quota = Arc::new(FixedQuotaSource::new(10 * MIB, 100 * MIB));
    let harness = Harness::new(ScriptedExecutor::default(), quota).await;

    let storage = harness.manager.get_storage_quota().await.unwrap();
    assert_eq!(storage.available, 90 * MIB);
    assert_eq!(storage.percentage, 10);

    assert!(harness.manager.check_storage_space(90 * MIB).await.unwrap());
    assert!(!harness.manager.check_storage_space(90 * MIB + 1).await.unwrap());
}

#[tokio::test]
async fn test_insufficient_storage_does_not_block_others() {
    let quota = Arc::new(FixedQuotaSource::new(10 * MIB, 100 * MIB));
    let executor = ScriptedExecutor::default().consuming(quota.clone());
    let harness = Harness::new(executor, quota).await;

    harness
        .manager
        .add_to_queue(vec![content("small", 10), content("medium", 20), content("large", 300)])
        .await
        .unwrap();
    let queue = harness.settle().await;

    assert_eq!(status_of(&queue, "small"), ItemStatus::Completed);
    assert_eq!(status_of(&queue, "medium"), ItemStatus::Completed);
    assert_eq!(status_of(&queue, "large"), ItemStatus::Failed);

    let large = queue.items.iter().find(|i| i.content.id == "large").unwrap();
    assert!(large.is_storage_failure());
    assert!(large
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("Insufficient storage"));
    assert_eq!(large.retry_count, 0);

    assert_eq!(harness.executor.attempts(), vec!["small", "medium"]);
    assert!(!queue.is_active);
}

#[tokio::test]
async fn test_large_item_first_still_lets_later_items_run() {
    let quota = Arc::new(FixedQuotaSource::new(10 * MIB, 100 * MIB));
    let harness = Harness::new(ScriptedExecutor::default(), quota).await;

    harness
        .manager
        .add_to_queue(vec![content("large", 300), content("small", 10)])
        .await
        .unwrap();
    let queue = harness.settle().await;

    assert_eq!(status_of(&queue, "large"), ItemStatus::Failed);
    assert_eq!(status_of(&queue, "small"), ItemStatus::Completed);
}

#[tokio::test]
async fn test_unavailable_estimate_with_deny_fails_admission() {
    let harness = Harness::new(
        ScriptedExecutor::default(),
        Arc::new(FixedQuotaSource::unavailable()),
    )
    .await;

    harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    let queue = harness.settle().await;

    let item = &queue.items[0];
    assert_eq!(item.status, ItemStatus::Failed);
    assert!(item.is_storage_failure());
    assert!(item.last_error.as_deref().unwrap().contains("unavailable"));
    assert!(harness.executor.attempts().is_empty());
}

#[tokio::test]
async fn test_unavailable_estimate_with_unbounded_admits() {
    let config = QueueConfigBuilder::new()
        .retry_base_delay(Duration::ZERO)
        .retry_max_delay(Duration::ZERO)
        .quota_fallback(QuotaFallback::Unbounded)
        .build();
    let harness = Harness::with_config(
        config,
        ScriptedExecutor::default(),
        Arc::new(FixedQuotaSource::unavailable()),
    )
    .await;

    harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    let queue = harness.settle().await;
    assert_eq!(queue.items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_completion_sets_full_progress() {
    let harness = Harness::new(ScriptedExecutor::default(), roomy_quota()).await;
    harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();

    let queue = harness.settle().await;
    assert_eq!(queue.items[0].status, ItemStatus::Completed);
    assert_eq!(queue.items[0].progress, 100);
    assert_eq!(harness.persisted().await.unwrap(), queue);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let executor = ScriptedExecutor::default().with("flaky", Behavior::AlwaysFail);
    let harness = Harness::new(executor, roomy_quota()).await;

    harness.manager.add_to_queue(vec![content("flaky", 1)]).await.unwrap();
    let queue = harness.settle().await;

    let item = &queue.items[0];
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.retry_count, crate::constants::MAX_RETRIES);
    assert_eq!(item.last_error.as_deref(), Some("Server error: HTTP 503"));
    assert!(!item.is_storage_failure());
    assert_eq!(harness.executor.attempts().len(), 3);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let executor = ScriptedExecutor::default().with("flaky", Behavior::FailTimes(2));
    let harness = Harness::new(executor, roomy_quota()).await;

    harness.manager.add_to_queue(vec![content("flaky", 1)]).await.unwrap();
    let queue = harness.settle().await;

    let item = &queue.items[0];
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.retry_count, 2);
    assert!(item.last_error.is_none());
}

#[tokio::test]
async fn test_failed_attempt_goes_to_back() {
    let executor = ScriptedExecutor::default().with("a", Behavior::FailTimes(1));
    let harness = Harness::with_config(
        QueueConfigBuilder::new()
            .autostart(false)
            .retry_base_delay(Duration::ZERO)
            .retry_max_delay(Duration::ZERO)
            .build(),
        executor,
        roomy_quota(),
    )
    .await;

    harness
        .manager
        .add_to_queue(vec![content("a", 1), content("b", 1)])
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let queue = harness.settle().await;

    assert_eq!(harness.executor.attempts(), vec!["a", "b", "a"]);
    assert_eq!(queue.items[0].content.id, "b");
    assert_eq!(queue.items[1].content.id, "a");
    assert!(queue.items.iter().all(|i| i.status == ItemStatus::Completed));
}

#[tokio::test]
async fn test_retry_delay_does_not_block_queue() {
    let executor = ScriptedExecutor::default().with("a", Behavior::FailTimes(1));
    let config = QueueConfigBuilder::new()
        .autostart(false)
        .retry_base_delay(Duration::from_millis(200))
        .retry_jitter(0.0)
        .build();
    let harness = Harness::with_config(config, executor, roomy_quota()).await;

    harness
        .manager
        .add_to_queue(vec![content("a", 1), content("b", 1), content("c", 1)])
        .await
        .unwrap();
    harness.manager.start().await.unwrap();
    let queue = harness.settle().await;

    assert_eq!(harness.executor.attempts(), vec!["a", "b", "c", "a"]);
    assert!(queue.items.iter().all(|i| i.status == ItemStatus::Completed));
}

#[tokio::test]
async fn test_autostart_disabled_waits_for_start() {
    let harness = Harness::with_config(
        QueueConfigBuilder::new().autostart(false).build(),
        ScriptedExecutor::default(),
        roomy_quota(),
    )
    .await;

    harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!harness.manager.is_running().await);
    assert!(harness.executor.attempts().is_empty());

    harness.manager.start().await.unwrap();
    let queue = harness.settle().await;
    assert_eq!(queue.items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_remove_during_download_cancels() {
    let executor = ScriptedExecutor::default().with("slow", Behavior::FinishLate);
    let harness = Harness::new(executor, roomy_quota()).await;

    harness.manager.add_to_queue(vec![content("slow", 1)]).await.unwrap();
    let item_id = harness.wait_for_downloading().await;

    assert!(harness.manager.remove_from_queue(&item_id).await.unwrap());

    // Give the executor time to finish on its own
    tokio::time::sleep(Duration::from_millis(250)).await;

    let queue = harness.manager.get_queue().unwrap();
    assert!(queue.is_empty());
    assert!(!queue.is_active);
    assert!(harness.persisted().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_cancels_and_empties() {
    let executor = ScriptedExecutor::default().with("stuck", Behavior::Hang);
    let harness = Harness::new(executor, roomy_quota()).await;

    harness
        .manager
        .add_to_queue(vec![content("stuck", 1), content("next", 1)])
        .await
        .unwrap();
    harness.wait_for_downloading().await;

    assert_eq!(harness.manager.clear_queue().await.unwrap(), 2);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let queue = harness.manager.get_queue().unwrap();
    assert!(queue.is_empty());
    assert!(!queue.is_active);
    assert_eq!(harness.persisted().await.unwrap(), DownloadQueue::new());
    assert_eq!(harness.executor.attempts(), vec!["stuck"]);
}

#[tokio::test]
async fn test_queue_keeps_running_after_removal() {
    let executor = ScriptedExecutor::default().with("stuck", Behavior::Hang);
    let harness = Harness::new(executor, roomy_quota()).await;

    harness
        .manager
        .add_to_queue(vec![content("stuck", 1), content("next", 1)])
        .await
        .unwrap();
    let stuck = harness.wait_for_downloading().await;
    harness.manager.remove_from_queue(&stuck).await.unwrap();

    let queue = harness.settle().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(status_of(&queue, "next"), ItemStatus::Completed);
}

#[tokio::test]
async fn test_destroy_stops_everything() {
    let executor = ScriptedExecutor::default().with("slow", Behavior::FinishLate);
    let harness = Harness::new(executor, roomy_quota()).await;

    harness.manager.add_to_queue(vec![content("slow", 1)]).await.unwrap();
    harness.wait_for_downloading().await;

    harness.manager.destroy().await;
    let persisted = harness.persisted().await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(harness.persisted().await.unwrap(), persisted);
    assert_eq!(persisted.items[0].status, ItemStatus::Downloading);

    assert!(matches!(
        harness.manager.add_to_queue(vec![content("other", 1)]).await,
        Err(QueueError::Destroyed)
    ));
    assert!(matches!(
        harness.manager.get_queue(),
        Err(QueueError::Destroyed)
    ));
    assert!(matches!(
        harness.manager.start().await,
        Err(QueueError::Destroyed)
    ));
    assert!(!harness.manager.is_running().await);

    // Second destroy is a no-op
    harness.manager.destroy().await;
}

#[tokio::test]
async fn test_restart_resumes_interrupted_download() {
    let store = Arc::new(MemoryBlobStore::new());
    {
        let executor = ScriptedExecutor::default().with("c", Behavior::Hang);
        let harness =
            Harness::with_store(ConfigPresets::testing(), executor, roomy_quota(), store.clone())
                .await;
        harness.manager.add_to_queue(vec![content("c", 1)]).await.unwrap();
        harness.wait_for_downloading().await;
        harness.manager.destroy().await;
    }

    let harness = Harness::with_store(
        ConfigPresets::testing(),
        ScriptedExecutor::default(),
        roomy_quota(),
        store,
    )
    .await;
    let queue = harness.settle().await;

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_retry_failed_requeues() {
    let executor = ScriptedExecutor::default().with("flaky", Behavior::FailTimes(3));
    let harness = Harness::new(executor, roomy_quota()).await;

    harness.manager.add_to_queue(vec![content("flaky", 1)]).await.unwrap();
    let queue = harness.settle().await;
    assert_eq!(queue.items[0].status, ItemStatus::Failed);

    assert_eq!(harness.manager.retry_failed().await.unwrap(), 1);
    let queue = harness.settle().await;
    assert_eq!(queue.items[0].status, ItemStatus::Completed);
    assert_eq!(queue.items[0].retry_count, 0);
}

#[tokio::test]
async fn test_catalog_errors_surface_to_caller() {
    let harness = Harness::new(ScriptedExecutor::default(), roomy_quota()).await;
    let selection = crate::app::models::ContentSelection::new(
        "physics",
        9,
        crate::app::models::Language::Bangla,
    );

    let error = harness
        .manager
        .get_available_content(&selection)
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Network error");
}

#[tokio::test]
async fn test_concurrent_adds_are_not_lost() {
    let harness = Arc::new(
        Harness::with_config(
            QueueConfigBuilder::new().autostart(false).build(),
            ScriptedExecutor::default(),
            roomy_quota(),
        )
        .await,
    );

    let mut handles = Vec::new();
    for i in 0..20 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness
                .manager
                .add_to_queue(vec![content(&format!("c-{}", i), 1)])
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(harness.manager.get_queue().unwrap().len(), 20);
    assert_eq!(harness.persisted().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_failed_add_leaves_nothing_to_download() {
    let store = Arc::new(FlakyBlobStore::default());
    let harness = Harness::with_store(
        ConfigPresets::testing(),
        ScriptedExecutor::default(),
        roomy_quota(),
        store.clone(),
    )
    .await;

    store.fail_writes(true);
    let result = harness.manager.add_to_queue(vec![content("lost", 1)]).await;
    assert!(matches!(result, Err(QueueError::Persistence(_))));
    assert!(harness.manager.get_queue().unwrap().is_empty());
    assert!(harness.persisted().await.is_none());

    store.fail_writes(false);
    harness.manager.add_to_queue(vec![content("kept", 1)]).await.unwrap();
    let queue = harness.settle().await;

    assert_eq!(queue.len(), 1);
    assert_eq!(status_of(&queue, "kept"), ItemStatus::Completed);
    assert_eq!(harness.executor.attempts(), vec!["kept".to_string()]);
}

#[tokio::test]
async fn test_failed_remove_keeps_transfer_running() {
    let store = Arc::new(FlakyBlobStore::default());
    let executor = ScriptedExecutor::default().with("stuck", Behavior::Hang);
    let harness =
        Harness::with_store(ConfigPresets::testing(), executor, roomy_quota(), store.clone()).await;

    harness.manager.add_to_queue(vec![content("stuck", 1)]).await.unwrap();
    let item_id = harness.wait_for_downloading().await;

    store.fail_writes(true);
    let result = harness.manager.remove_from_queue(&item_id).await;
    assert!(matches!(result, Err(QueueError::Persistence(_))));
    let result = harness.manager.clear_queue().await;
    assert!(matches!(result, Err(QueueError::Persistence(_))));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let queue = harness.manager.get_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(status_of(&queue, "stuck"), ItemStatus::Downloading);
    assert_eq!(harness.executor.attempts(), vec!["stuck".to_string()]);

    store.fail_writes(false);
    assert!(harness.manager.remove_from_queue(&item_id).await.unwrap());
    let queue = harness.settle().await;
    assert!(queue.is_empty());
    assert!(harness.persisted().await.unwrap().is_empty());
}
