//! Command handlers for Lesson Prefetch CLI
//!
//! This module implements the command handlers that wire the configured
//! storage, HTTP client and queue manager together for each CLI command.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::client::auth::mask_token;
use crate::app::client::{
    CatalogClient, CatalogTransport, ClientConfig, HttpHandler, TokenSource,
};
use crate::app::executor::HttpDownloadExecutor;
use crate::app::models::DownloadableContent;
use crate::app::queue::{DownloadQueue, QueueConfig, QueueManager, QueuePorts};
use crate::app::storage::{BlobStore, DirectoryQuotaSource, FileBlobStore, StorageQuotaEstimator};
use crate::cli::progress::{print_summary, ProgressConfig, QueueProgressDisplay};
use crate::cli::{EnqueueArgs, SelectionArgs, TokenAction, TokenArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Runtime components shared by all commands
pub struct Services {
    data_dir: PathBuf,
    store: Arc<dyn BlobStore>,
    tokens: TokenSource,
    http: Arc<HttpHandler>,
    base_url: Url,
    queue_config: QueueConfig,
    budget_bytes: u64,
}

impl Services {
    /// Open the data directory and build the HTTP client from `config`
    pub async fn build(config: &AppConfig, data_dir_override: Option<PathBuf>) -> Result<Self> {
        let (client_config, queue_config): (ClientConfig, QueueConfig) =
            config.to_runtime_config();
        queue_config.validate().map_err(AppError::generic)?;

        let data_dir = data_dir_override.unwrap_or_else(|| config.data_dir());
        debug!("Using data directory {}", data_dir.display());

        let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::open(&data_dir).await?);
        let base_url = client_config.parsed_base_url()?;
        let http = Arc::new(HttpHandler::from_config(&client_config)?);

        Ok(Self {
            data_dir,
            tokens: TokenSource::new(Arc::clone(&store)),
            store,
            http,
            base_url,
            queue_config,
            budget_bytes: config.storage.budget_bytes,
        })
    }

    /// Queue manager over these services
    ///
    /// With `autostart` false no transfer begins until `start()` is called.
    pub async fn queue_manager(&self, autostart: bool) -> QueueManager {
        let config = QueueConfig {
            autostart,
            ..self.queue_config.clone()
        };
        let quota = StorageQuotaEstimator::new(
            Arc::new(DirectoryQuotaSource::new(&self.data_dir, self.budget_bytes)),
            config.quota_fallback,
        );
        let ports = QueuePorts {
            store: Arc::clone(&self.store),
            quota,
            executor: Arc::new(HttpDownloadExecutor::new(
                Arc::clone(&self.http),
                self.tokens.clone(),
                Arc::clone(&self.store),
                self.base_url.clone(),
            )),
            catalog: CatalogClient::new(
                Arc::clone(&self.http) as Arc<dyn CatalogTransport>,
                self.tokens.clone(),
                self.base_url.clone(),
            ),
        };
        QueueManager::new(config, ports).await
    }
}

/// Handle the catalog command
pub async fn handle_catalog(services: &Services, args: SelectionArgs) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    let manager = services.queue_manager(false).await;

    let result = manager.get_available_content(&args.selection()).await;
    manager.destroy().await;
    let content = result?;

    if content.is_empty() {
        println!("No content found for this selection.");
        return Ok(());
    }

    println!("📚 Available content ({} item(s))", content.len());
    println!();
    print_content_table(&content);
    Ok(())
}

/// Handle the enqueue command
pub async fn handle_enqueue(services: &Services, args: EnqueueArgs) -> Result<()> {
    args.selection.validate().map_err(AppError::generic)?;
    let manager = services.queue_manager(false).await;

    let result = enqueue(&manager, &args).await;
    if result.is_err() || !args.wait {
        manager.destroy().await;
        return result;
    }

    drive_queue(&manager).await
}

async fn enqueue(manager: &QueueManager, args: &EnqueueArgs) -> Result<()> {
    let mut content = manager
        .get_available_content(&args.selection.selection())
        .await?;

    if !args.ids.is_empty() {
        for id in &args.ids {
            if !content.iter().any(|c| &c.id == id) {
                warn!("Content id {} is not part of this selection", id);
            }
        }
        content.retain(|c| args.ids.contains(&c.id));
    }

    let requested = content.len();
    let added = manager.add_to_queue(content).await?;
    println!(
        "📥 Added {} item(s) to the download queue ({} already queued)",
        added.len(),
        requested - added.len()
    );
    Ok(())
}

/// Handle the queue command
pub async fn handle_queue(services: &Services) -> Result<()> {
    let manager = services.queue_manager(false).await;
    let queue = manager.get_queue();
    manager.destroy().await;
    let queue = queue?;

    if queue.is_empty() {
        println!("The download queue is empty.");
        return Ok(());
    }

    print_queue_table(&queue);
    Ok(())
}

/// Handle the remove command
pub async fn handle_remove(services: &Services, item_id: &str) -> Result<()> {
    let manager = services.queue_manager(false).await;
    let removed = manager.remove_from_queue(item_id).await;
    manager.destroy().await;

    if removed? {
        println!("🗑️  Removed {} from the download queue", item_id);
    } else {
        println!("No queue item with id {}", item_id);
    }
    Ok(())
}

/// Handle the clear command
pub async fn handle_clear(services: &Services) -> Result<()> {
    let manager = services.queue_manager(false).await;
    let removed = manager.clear_queue().await;
    manager.destroy().await;

    println!("🗑️  Removed {} item(s) from the download queue", removed?);
    Ok(())
}

/// Handle the retry command
pub async fn handle_retry(services: &Services) -> Result<()> {
    let manager = services.queue_manager(false).await;
    let requeued = manager.retry_failed().await;
    manager.destroy().await;

    match requeued? {
        0 => println!("No failed items to retry."),
        n => println!("🔄 Requeued {} failed item(s). Run `lesson_prefetch run` to download them.", n),
    }
    Ok(())
}

/// Handle the quota command
pub async fn handle_quota(services: &Services) -> Result<()> {
    let manager = services.queue_manager(false).await;
    let quota = manager.get_storage_quota().await;
    manager.destroy().await;
    let quota = quota?;

    println!("💾 Storage Quota");
    println!("===============");
    println!("Data directory: {}", services.data_dir.display());
    if quota.total == u64::MAX {
        println!("Quota:          unbounded");
    } else {
        println!("Used:           {}", format_bytes(quota.used));
        println!("Total:          {}", format_bytes(quota.total));
        println!("Available:      {}", format_bytes(quota.available));
        println!("Usage:          {}%", quota.percentage);
    }
    Ok(())
}

/// Handle the run command
pub async fn handle_run(services: &Services) -> Result<()> {
    let manager = services.queue_manager(false).await;
    drive_queue(&manager).await
}

/// Process the queue until it settles, stopping early on Ctrl-C
async fn drive_queue(manager: &QueueManager) -> Result<()> {
    let pending = manager.get_queue()?.queue_stats();
    if pending.pending == 0 {
        println!("ℹ️  Nothing to download - no pending items in the queue");
        manager.destroy().await;
        return Ok(());
    }

    println!("🚀 Downloading {} pending item(s)...", pending.pending);
    let receiver = manager.subscribe()?;
    manager.start().await?;

    let stop = CancellationToken::new();
    let display = QueueProgressDisplay::new(ProgressConfig::default());
    let progress = {
        let stop = stop.clone();
        tokio::spawn(async move { display.run(receiver, stop).await })
    };

    let interrupted = tokio::select! {
        settled = manager.wait_until_settled() => {
            settled?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            true
        }
    };

    if interrupted {
        eprintln!("\n🛑 Ctrl-C received - stopping downloads");
        info!("Interrupted; the current transfer restarts on the next run");
    }

    let stats = manager.get_queue()?.queue_stats();
    stop.cancel();
    match progress.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Progress display failed: {}", e),
        Err(e) => warn!("Progress display task failed: {}", e),
    }
    manager.destroy().await;

    print_summary(&stats);
    Ok(())
}

/// Handle the token command
pub async fn handle_token(services: &Services, args: TokenArgs) -> Result<()> {
    match args.action {
        TokenAction::Set { value } => {
            let token = match value {
                Some(value) => value,
                None => rpassword::prompt_password("API token: ")?,
            };
            if token.trim().is_empty() {
                return Err(AppError::generic("Token must not be empty"));
            }
            services.tokens.set_token(&token).await?;
            println!("✅ Token stored");
        }
        TokenAction::Clear => {
            services.tokens.clear().await?;
            println!("✅ Token cleared");
        }
        TokenAction::Status => match services.tokens.token().await? {
            Some(token) => println!("🔐 Token stored: {}", mask_token(&token)),
            None => {
                println!("⚠️  No token stored. Requests are sent without authorization.");
                println!("   Run 'lesson_prefetch token set' to store one.");
            }
        },
    }
    Ok(())
}

fn print_content_table(content: &[DownloadableContent]) {
    println!(
        "{:<12} {:<40} {:>7} {:>5} {:>10}",
        "ID", "Title", "Chapter", "Page", "Size"
    );
    println!("{}", "-".repeat(78));
    for item in content {
        println!(
            "{:<12} {:<40} {:>7} {:>5} {:>10}",
            truncate(&item.id, 12),
            truncate(&item.title, 40),
            item.chapter,
            item.page_number,
            format_bytes(item.size)
        );
    }
}

fn print_queue_table(queue: &DownloadQueue) {
    println!(
        "{:<36} {:<30} {:<12} {:>5} {:>7}",
        "Item ID", "Title", "Status", "%", "Retries"
    );
    println!("{}", "-".repeat(94));
    for item in &queue.items {
        println!(
            "{:<36} {:<30} {:<12} {:>5} {:>7}",
            item.id,
            truncate(&item.content.title, 30),
            item.status,
            item.progress,
            item.retry_count
        );
        if let Some(error) = &item.last_error {
            println!("    └─ {}", error);
        }
    }

    let stats = queue.queue_stats();
    println!();
    println!(
        "{} item(s): {} pending, {} downloading, {} completed, {} failed",
        stats.total, stats.pending, stats.downloading, stats.completed, stats.failed
    );
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
