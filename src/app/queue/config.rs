//! Configuration for the download queue
//!
//! Retry limits, backoff delays and progress throttling are all runtime
//! configuration rather than hard-coded values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::storage::QuotaFallback;
use crate::constants::queue;

/// Retry policy for failed transfer attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts allowed before an item is terminally failed
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on any retry delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Exponential multiplier per failed attempt
    pub multiplier: u32,
    /// Jitter as a fraction of the delay (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: queue::MAX_RETRIES,
            base_delay: queue::RETRY_BASE_DELAY,
            max_delay: queue::RETRY_MAX_DELAY,
            multiplier: queue::RETRY_MULTIPLIER,
            jitter: queue::RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failure number `retry_count` (1-based)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1);
        let base_millis = self.base_delay.as_millis() as u64;
        let factor = (self.multiplier.max(1) as u64).saturating_pow(exponent);
        let capped = base_millis
            .saturating_mul(factor)
            .min(self.max_delay.as_millis() as u64);

        let jitter_range = (capped as f64 * self.jitter.clamp(0.0, 1.0)) as u64;
        let jitter = if jitter_range > 0 {
            fastrand::u64(0..=jitter_range * 2) as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped as i64 + jitter).max(0) as u64)
    }
}

/// Configuration for the queue manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Retry policy for failed transfers
    pub retry: RetryPolicy,
    /// Minimum interval between persisted progress updates
    #[serde(with = "humantime_serde")]
    pub progress_persist_interval: Duration,
    /// Buffer size of the executor progress channel
    pub progress_buffer_size: usize,
    /// Behaviour when the host cannot estimate storage
    pub quota_fallback: QuotaFallback,
    /// Start processing as soon as the manager is constructed
    pub autostart: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfigBuilder::new().build()
    }
}

impl QueueConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err("retry max_delay must not be smaller than base_delay".to_string());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err("retry jitter must be between 0.0 and 1.0".to_string());
        }
        if self.progress_buffer_size == 0 {
            return Err("progress_buffer_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for creating queue configurations
#[derive(Debug, Clone, Default)]
pub struct QueueConfigBuilder {
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    retry_multiplier: Option<u32>,
    retry_jitter: Option<f64>,
    progress_persist_interval: Option<Duration>,
    progress_buffer_size: Option<usize>,
    quota_fallback: Option<QuotaFallback>,
    autostart: Option<bool>,
}

impl QueueConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retry attempts
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set base retry delay
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Set maximum retry delay
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = Some(delay);
        self
    }

    /// Set exponential multiplier
    pub fn retry_multiplier(mut self, multiplier: u32) -> Self {
        self.retry_multiplier = Some(multiplier);
        self
    }

    /// Set retry jitter fraction
    pub fn retry_jitter(mut self, jitter: f64) -> Self {
        self.retry_jitter = Some(jitter);
        self
    }

    /// Set progress persistence throttle
    pub fn progress_persist_interval(mut self, interval: Duration) -> Self {
        self.progress_persist_interval = Some(interval);
        self
    }

    /// Set progress channel size
    pub fn progress_buffer_size(mut self, size: usize) -> Self {
        self.progress_buffer_size = Some(size);
        self
    }

    /// Set quota fallback policy
    pub fn quota_fallback(mut self, fallback: QuotaFallback) -> Self {
        self.quota_fallback = Some(fallback);
        self
    }

    /// Set whether the driver starts immediately
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = Some(autostart);
        self
    }

    /// Build the configuration
    pub fn build(self) -> QueueConfig {
        let defaults = RetryPolicy::default();
        QueueConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries.unwrap_or(defaults.max_retries),
                base_delay: self.retry_base_delay.unwrap_or(defaults.base_delay),
                max_delay: self.retry_max_delay.unwrap_or(defaults.max_delay),
                multiplier: self.retry_multiplier.unwrap_or(defaults.multiplier),
                jitter: self.retry_jitter.unwrap_or(defaults.jitter),
            },
            progress_persist_interval: self
                .progress_persist_interval
                .unwrap_or(queue::PROGRESS_PERSIST_INTERVAL),
            progress_buffer_size: self
                .progress_buffer_size
                .unwrap_or(queue::PROGRESS_BUFFER_SIZE),
            quota_fallback: self.quota_fallback.unwrap_or_default(),
            autostart: self.autostart.unwrap_or(true),
        }
    }
}

/// Configuration presets for different use cases
pub struct ConfigPresets;

impl ConfigPresets {
    /// Configuration for real devices
    pub fn production() -> QueueConfig {
        QueueConfigBuilder::new().build()
    }

    /// Configuration for tests: immediate retries, no throttling
    pub fn testing() -> QueueConfig {
        QueueConfigBuilder::new()
            .retry_base_delay(Duration::ZERO)
            .retry_max_delay(Duration::ZERO)
            .retry_jitter(0.0)
            .progress_persist_interval(Duration::ZERO)
            .build()
    }
}
