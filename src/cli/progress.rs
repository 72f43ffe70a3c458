//! Progress display for queue runs
//!
//! Renders an indicatif bar from the queue snapshots published by
//! [`QueueManager::subscribe`](crate::app::queue::QueueManager::subscribe).
//! Each item contributes 100 units to the bar: terminal items count in full,
//! the downloading item counts its current progress. When stderr is not a
//! terminal a plain text line is printed periodically instead.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::queue::{DownloadQueue, ItemStatus, QueueStats};
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Interval between text reports when no bar is drawn
    pub report_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            report_interval: Duration::from_secs(10),
        }
    }
}

/// Bar position for a snapshot, in units of 100 per item
pub fn overall_position(queue: &DownloadQueue) -> u64 {
    queue
        .items
        .iter()
        .map(|item| match item.status {
            ItemStatus::Completed | ItemStatus::Failed => 100,
            ItemStatus::Downloading => u64::from(item.progress.min(100)),
            ItemStatus::Pending => 0,
        })
        .sum()
}

/// Title of the item currently downloading, if any
fn current_title(queue: &DownloadQueue) -> Option<&str> {
    queue
        .items
        .iter()
        .find(|item| item.is_downloading())
        .map(|item| item.content.title.as_str())
}

/// Queue progress display
pub struct QueueProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
}

impl QueueProgressDisplay {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            is_terminal: atty::is(atty::Stream::Stderr),
        }
    }

    /// Follow snapshots until `stop` fires or the sender goes away
    ///
    /// Returns the stats of the last snapshot seen.
    pub async fn run(
        &self,
        mut receiver: watch::Receiver<DownloadQueue>,
        stop: CancellationToken,
    ) -> Result<QueueStats> {
        let bar = if self.config.enable_progress_bars && self.is_terminal {
            Some(Self::create_bar()?)
        } else {
            None
        };
        let mut last_report: Option<Instant> = None;

        let stats = loop {
            let (stats, position, title) = {
                let queue = receiver.borrow_and_update();
                (
                    queue.queue_stats(),
                    overall_position(&queue),
                    current_title(&queue).map(str::to_string),
                )
            };

            match &bar {
                Some(bar) => {
                    bar.set_length(stats.total as u64 * 100);
                    bar.set_position(position);
                    bar.set_message(title.unwrap_or_else(|| "Waiting".to_string()));
                }
                None => {
                    if last_report.map_or(true, |at| at.elapsed() >= self.config.report_interval)
                    {
                        eprintln!(
                            "Progress: {}/{} finished ({:.1}%), {} pending, {} failed",
                            stats.completed + stats.failed,
                            stats.total,
                            stats.finished_percentage(),
                            stats.pending + stats.downloading,
                            stats.failed
                        );
                        last_report = Some(Instant::now());
                    }
                }
            }

            tokio::select! {
                _ = stop.cancelled() => break stats,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break stats;
                    }
                }
            }
        };

        if let Some(bar) = bar {
            bar.finish_with_message("Done");
        }
        debug!("Progress display finished");
        Ok(stats)
    }

    fn create_bar() -> Result<ProgressBar> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Ok(bar)
    }
}

/// Print a summary of a finished run
pub fn print_summary(stats: &QueueStats) {
    eprintln!("\n✅ Queue Summary:");
    eprintln!("   Total items: {}", stats.total);
    eprintln!("   Completed: {}", stats.completed);
    eprintln!("   Failed: {}", stats.failed);
    eprintln!("   Still pending: {}", stats.pending + stats.downloading);
    eprintln!("   Downloaded: {:.1} MiB", stats.completed_bytes as f64 / 1_048_576.0);

    if stats.failed > 0 {
        eprintln!("⚠️  Some items failed. Run `lesson_prefetch retry` to try them again.");
    }
}
