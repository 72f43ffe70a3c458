//! Download executor port
//!
//! An executor performs one byte transfer for one [`QueueItem`]. It reports
//! progress through a [`ProgressReporter`] and stops when its
//! [`CancellationToken`] fires. The queue driver owns every state change;
//! executors never touch the queue themselves.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app::queue::QueueItem;
use crate::errors::TransferResult;

pub mod http;

pub use http::HttpDownloadExecutor;

/// Performs the transfer of one queue item
#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    /// Transfer and store the bytes of `item.content`
    ///
    /// Returns `Ok(())` once the bytes are stored. Once `cancel` fires the
    /// executor must stop without storing anything further.
    async fn execute(
        &self,
        item: &QueueItem,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> TransferResult<()>;
}

/// Sends percentage updates for one transfer to the queue driver
///
/// Updates are lossy: when the driver is busy an update is dropped and the
/// next one supersedes it.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: mpsc::Sender<u8>,
    last: u8,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::Sender<u8>) -> Self {
        Self { sender, last: 0 }
    }

    /// Reporter whose updates go nowhere
    pub fn detached() -> Self {
        let (sender, _receiver) = mpsc::channel(1);
        Self::new(sender)
    }

    /// Report a percentage; values that do not advance are skipped
    pub fn report_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        if percent <= self.last {
            return;
        }
        if self.sender.try_send(percent).is_ok() {
            self.last = percent;
        }
    }

    /// Report bytes received out of `total`
    pub fn report_bytes(&mut self, received: u64, total: u64) {
        self.report_percent(percent_of(received, total));
    }
}

/// `received / total` as a whole percentage; an empty total counts as done
pub fn percent_of(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((received.min(total) as f64 / total as f64) * 100.0).floor() as u8
}
