//! Background driver
//!
//! One task per manager. Each round it picks the earliest-inserted ready
//! item, checks the storage budget, then runs the executor for it while
//! applying progress updates. Every write to the queue happens under the
//! state lock and only while the transfer's cancellation token is live, so
//! a removed item or a destroyed manager never sees a late update.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::manager::Shared;
use super::state::{NextWork, QueueState};
use super::types::FailureOutcome;
use crate::app::executor::ProgressReporter;
use crate::app::storage::StorageQuotaEstimator;
use crate::errors::TransferResult;

/// Admission check against a fresh quota
///
/// `Err(Some(available))` when the item does not fit, `Err(None)` when no
/// estimate could be obtained.
pub(super) async fn fits(
    quota: &StorageQuotaEstimator,
    required_bytes: u64,
) -> Result<(), Option<u64>> {
    match quota.quota().await {
        Ok(quota) if quota.can_fit(required_bytes) => Ok(()),
        Ok(quota) => Err(Some(quota.available)),
        Err(e) => {
            debug!("Admission check without estimate: {}", e);
            Err(None)
        }
    }
}

/// Driver loop; returns once the shutdown token fires
pub(super) async fn run(shared: Arc<Shared>) {
    info!("Queue driver started");

    while !shared.shutdown.is_cancelled() {
        let next = shared.state.lock().await.next_work(Utc::now());

        match next {
            NextWork::Ready { item_id, size } => process(&shared, &item_id, size).await,
            NextWork::WaitUntil(due) => {
                let wait = (due - Utc::now()).to_std().unwrap_or_default();
                debug!("Next retry due in {:?}", wait);
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            NextWork::Idle => {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                }
            }
        }
    }

    info!("Queue driver stopped");
}

/// Admit and transfer one item
async fn process(shared: &Shared, item_id: &str, size: u64) {
    // The quota read happens outside the lock; the item is re-checked after
    let admission = fits(&shared.quota, size).await;

    let mut state = shared.state.lock().await;
    if shared.shutdown.is_cancelled() {
        return;
    }
    let Some(item) = state.get_mut(item_id) else {
        return;
    };
    if !item.is_ready(Utc::now()) {
        return;
    }

    if let Err(available) = admission {
        item.fail_insufficient_storage(size, available);
        warn!(
            "Not enough storage for '{}': {}",
            item.content.title,
            item.last_error.as_deref().unwrap_or_default()
        );
        persist(shared, &state).await;
        return;
    }

    let cancel = shared.shutdown.child_token();
    if !state.start_transfer(item_id, cancel.clone()) {
        return;
    }
    let Some(item) = state.get(item_id).cloned() else {
        return;
    };
    persist(shared, &state).await;
    drop(state);

    info!(
        "Starting download of '{}' (attempt {})",
        item.content.title,
        item.retry_count + 1
    );

    let (sender, mut receiver) = mpsc::channel(shared.config.progress_buffer_size.max(1));
    let transfer = shared
        .executor
        .execute(&item, ProgressReporter::new(sender), cancel.clone());
    tokio::pin!(transfer);

    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transfer of item {} cancelled", item_id);
                return;
            }
            result = &mut transfer => break result,
            Some(progress) = receiver.recv() => {
                apply_progress(shared, item_id, &cancel, progress).await;
            }
        }
    };

    finish(shared, item_id, &cancel, result).await;
}

async fn apply_progress(shared: &Shared, item_id: &str, cancel: &CancellationToken, progress: u8) {
    let mut state = shared.state.lock().await;
    if cancel.is_cancelled() {
        return;
    }
    let advanced = state
        .get_mut(item_id)
        .is_some_and(|item| item.record_progress(progress));
    if !advanced {
        return;
    }

    if state.progress_persist_due(shared.config.progress_persist_interval) {
        persist(shared, &state).await;
    } else {
        shared.publish(&state);
    }
}

async fn finish(
    shared: &Shared,
    item_id: &str,
    cancel: &CancellationToken,
    result: TransferResult<()>,
) {
    let mut state = shared.state.lock().await;
    if cancel.is_cancelled() {
        return;
    }

    let policy = &shared.config.retry;
    let mut requeue = false;
    if let Some(item) = state.get_mut(item_id) {
        match result {
            Ok(()) => {
                item.complete();
                info!("Completed download of '{}'", item.content.title);
            }
            Err(e) => {
                let delay = policy.delay_for(item.retry_count + 1);
                let retry_after = (!delay.is_zero())
                    .then(|| chrono::Duration::from_std(delay).ok())
                    .flatten()
                    .map(|delay| Utc::now() + delay);

                match item.record_failure(e.to_string(), policy.max_retries, retry_after) {
                    FailureOutcome::WillRetry { retry_count } => {
                        warn!(
                            "Download of '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                            item.content.title, retry_count, policy.max_retries, e, delay
                        );
                        requeue = true;
                    }
                    FailureOutcome::Exhausted { retry_count } => {
                        error!(
                            "Download of '{}' failed after {} attempts: {}",
                            item.content.title, retry_count, e
                        );
                    }
                }
            }
        }
    }

    if requeue {
        state.move_to_back(item_id);
    }
    state.finish_transfer();
    persist(shared, &state).await;
}

/// Transfer outcomes stay in memory when the write fails; the next write carries them
async fn persist(shared: &Shared, state: &QueueState) {
    if let Err(e) = shared.persist(state).await {
        warn!("Failed to persist download queue: {}", e);
        shared.publish(state);
    }
}
