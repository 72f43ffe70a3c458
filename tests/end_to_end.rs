//! End-to-end tests for the download queue
//!
//! A wiremock server plays the content API (catalog and transfers); the
//! queue persists into a directory-backed store in a temp dir and admission
//! is checked against a budget on that directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lesson_prefetch::app::client::{CatalogClient, ClientConfig, HttpHandler, TokenSource};
use lesson_prefetch::app::executor::HttpDownloadExecutor;
use lesson_prefetch::app::models::{ContentSelection, Language};
use lesson_prefetch::app::queue::{
    ConfigPresets, DownloadQueue, ItemStatus, QueueConfig, QueueManager, QueuePorts,
};
use lesson_prefetch::app::storage::{
    BlobStore, DirectoryQuotaSource, FileBlobStore, QuotaFallback, StorageQuotaEstimator,
};
use lesson_prefetch::errors::QueueError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KIB: u64 = 1024;

async fn ports(server: &MockServer, data_dir: &Path, budget_bytes: u64) -> QueuePorts {
    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::open(data_dir).await.unwrap());
    let tokens = TokenSource::new(Arc::clone(&store));
    tokens.set_token("device-token").await.unwrap();

    let config = ClientConfig::with_base_url(format!("{}/api", server.uri()));
    let base_url = config.parsed_base_url().unwrap();
    let http = Arc::new(HttpHandler::from_config(&config).unwrap());

    QueuePorts {
        store: Arc::clone(&store),
        quota: StorageQuotaEstimator::new(
            Arc::new(DirectoryQuotaSource::new(data_dir, budget_bytes)),
            QuotaFallback::Deny,
        ),
        executor: Arc::new(HttpDownloadExecutor::new(
            Arc::clone(&http),
            tokens.clone(),
            store,
            base_url.clone(),
        )),
        catalog: CatalogClient::new(http, tokens, base_url),
    }
}

fn descriptor(id: &str, size: u64) -> serde_json::Value {
    json!({
        "id": id,
        "subject": "chemistry",
        "grade": 10,
        "chapter": 4,
        "topic": "acids",
        "title": format!("Acids {}", id),
        "size": size,
        "language": "english",
        "textbookName": "Chemistry for Class Ten",
        "pageNumber": 60
    })
}

async fn mount_catalog(server: &MockServer, items: &[(&str, u64)]) {
    let content: Vec<_> = items.iter().map(|(id, size)| descriptor(id, *size)).collect();
    Mock::given(method("GET"))
        .and(path("/api/content/available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": content })))
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, id: &str, size: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/content/{}/download", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; size as usize]))
        .mount(server)
        .await;
}

fn selection() -> ContentSelection {
    ContentSelection::new("chemistry", 10, Language::English)
}

async fn settle(manager: &QueueManager) -> DownloadQueue {
    tokio::time::timeout(Duration::from_secs(10), manager.wait_until_settled())
        .await
        .expect("queue did not settle")
        .unwrap()
}

fn item_for<'a>(queue: &'a DownloadQueue, content_id: &str) -> &'a lesson_prefetch::app::queue::QueueItem {
    queue
        .items
        .iter()
        .find(|item| item.content.id == content_id)
        .unwrap()
}

#[tokio::test]
async fn test_downloads_what_fits_a_90_kib_budget() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    mount_catalog(&server, &[("c-10", 10 * KIB), ("c-20", 20 * KIB), ("c-300", 300 * KIB)]).await;
    mount_download(&server, "c-10", 10 * KIB).await;
    mount_download(&server, "c-20", 20 * KIB).await;
    mount_download(&server, "c-300", 300 * KIB).await;

    let manager = QueueManager::new(
        ConfigPresets::testing(),
        ports(&server, data_dir.path(), 90 * KIB).await,
    )
    .await;

    let content = manager.get_available_content(&selection()).await.unwrap();
    let added = manager.add_to_queue(content).await.unwrap();
    assert_eq!(added.len(), 3);

    let queue = settle(&manager).await;
    assert_eq!(item_for(&queue, "c-10").status, ItemStatus::Completed);
    assert_eq!(item_for(&queue, "c-10").progress, 100);
    assert_eq!(item_for(&queue, "c-20").status, ItemStatus::Completed);

    let big = item_for(&queue, "c-300");
    assert_eq!(big.status, ItemStatus::Failed);
    assert!(big
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("Insufficient storage"));

    let stored = tokio::fs::read(data_dir.path().join("content").join("c-10"))
        .await
        .unwrap();
    assert_eq!(stored.len() as u64, 10 * KIB);
    assert!(!data_dir.path().join("content").join("c-300").exists());

    manager.destroy().await;
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    mount_catalog(&server, &[("c-bad", 4 * KIB)]).await;
    Mock::given(method("GET"))
        .and(path("/api/content/c-bad/download"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let manager = QueueManager::new(
        ConfigPresets::testing(),
        ports(&server, data_dir.path(), 0).await,
    )
    .await;

    let content = manager.get_available_content(&selection()).await.unwrap();
    manager.add_to_queue(content).await.unwrap();

    let queue = settle(&manager).await;
    let item = item_for(&queue, "c-bad");
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.retry_count, 3);
    assert_eq!(item.last_error.as_deref(), Some("Server error: HTTP 503"));

    manager.destroy().await;
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    mount_catalog(&server, &[("c-1", 8 * KIB), ("c-2", 8 * KIB)]).await;
    mount_download(&server, "c-1", 8 * KIB).await;
    mount_download(&server, "c-2", 8 * KIB).await;

    let parked = QueueConfig {
        autostart: false,
        ..ConfigPresets::testing()
    };
    let first = QueueManager::new(parked, ports(&server, data_dir.path(), 0).await).await;
    let content = first.get_available_content(&selection()).await.unwrap();
    first.add_to_queue(content).await.unwrap();
    first.destroy().await;
    assert!(matches!(
        first.get_queue(),
        Err(QueueError::Destroyed)
    ));

    let second = QueueManager::new(
        ConfigPresets::testing(),
        ports(&server, data_dir.path(), 0).await,
    )
    .await;
    assert_eq!(second.get_queue().unwrap().len(), 2);

    let queue = settle(&second).await;
    assert_eq!(queue.queue_stats().completed, 2);
    assert!(!queue.is_active);
    second.destroy().await;

    let third = QueueManager::new(
        QueueConfig {
            autostart: false,
            ..ConfigPresets::testing()
        },
        ports(&server, data_dir.path(), 0).await,
    )
    .await;
    assert_eq!(third.get_queue().unwrap().queue_stats().completed, 2);
    third.destroy().await;
}
