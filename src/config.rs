//! Configuration management for Lesson Prefetch
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-source loading, and zero-config defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime_serde::re::humantime::format_duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::client::ClientConfig;
use crate::app::queue::{QueueConfig, QueueConfigBuilder};
use crate::app::storage::QuotaFallback;
use crate::constants::{api, env, http, limits, logging, queue, storage};
use crate::errors::{ConfigError, Result};

/// Name of the config file searched in the working directory
const LOCAL_CONFIG_FILE: &str = "lesson-prefetch.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Content API client settings
    pub client: ClientConfigToml,
    /// Download queue settings
    pub queue: QueueConfigToml,
    /// Local storage settings
    pub storage: StorageConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Base URL of the content API
    pub base_url: String,
    /// Request timeout (covers a whole transfer)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            base_url: api::DEFAULT_BASE_URL.to_string(),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// TOML-friendly queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfigToml {
    /// Attempts per item before it is marked failed
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Upper bound on retry delays
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
    /// Minimum interval between persisted progress updates
    #[serde(with = "humantime_serde")]
    pub progress_persist_interval: Duration,
}

impl Default for QueueConfigToml {
    fn default() -> Self {
        Self {
            max_retries: queue::MAX_RETRIES,
            retry_base_delay: queue::RETRY_BASE_DELAY,
            retry_max_delay: queue::RETRY_MAX_DELAY,
            progress_persist_interval: queue::PROGRESS_PERSIST_INTERVAL,
        }
    }
}

/// TOML-friendly storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfigToml {
    /// Data directory (leave unset for the platform default)
    pub data_dir: Option<PathBuf>,
    /// Storage budget in bytes for downloaded content (0 = free disk space only)
    pub budget_bytes: u64,
    /// Policy when no storage estimate is available
    pub quota_fallback: QuotaFallback,
}

impl Default for StorageConfigToml {
    fn default() -> Self {
        Self {
            data_dir: None,
            budget_bytes: storage::DEFAULT_BUDGET_BYTES,
            quota_fallback: QuotaFallback::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        if let Some(base_url) = lookup(env::API_BASE_URL) {
            debug!("{} overrides client.base_url", env::API_BASE_URL);
            self.client.base_url = base_url;
        }

        if let Some(data_dir) = lookup(env::DATA_DIR) {
            debug!("{} overrides storage.data_dir", env::DATA_DIR);
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Some(budget) = lookup(env::STORAGE_BUDGET) {
            self.storage.budget_bytes =
                budget
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        field: env::STORAGE_BUDGET.to_string(),
                        value: budget.clone(),
                        reason: e.to_string(),
                    })?;
        }

        Ok(())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let Some(config_path) = Self::get_default_config_path() else {
            warn!("Could not determine user config directory; skipping first-run setup");
            return Ok(None);
        };

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ConfigError::Io)?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(ConfigError::Io)?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(format!("./{}", LOCAL_CONFIG_FILE))];
        search_paths.extend(Self::get_default_config_path());

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    fn get_default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(storage::DATA_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Data directory: configured, else the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(storage::DATA_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(format!("./{}", storage::DATA_DIR_NAME)))
        })
    }

    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (ClientConfig, QueueConfig) {
        (
            self.client.to_runtime_config(),
            self.queue.to_runtime_config(self.storage.quota_fallback),
        )
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Lesson Prefetch Configuration
# This file was automatically generated on first run.
# You can customize any of these settings to suit your needs.

[client]
# Content API base URL (env: {env_base_url})
base_url = "{base_url}"
request_timeout = "{request_timeout}"
connect_timeout = "{connect_timeout}"
pool_max_per_host = {pool_max}
rate_limit_rps = {rps}

[queue]
# Attempts per item before it is marked failed
max_retries = {max_retries}
# Retry backoff doubles from the base delay up to the maximum
retry_base_delay = "{base_delay}"
retry_max_delay = "{max_delay}"
progress_persist_interval = "{persist_interval}"

[storage]
# Data directory (env: {env_data_dir}); leave unset for the system default
# data_dir = "/path/to/data"

# Storage budget in bytes (env: {env_budget}); 0 = limited by free disk space
budget_bytes = {budget}

# What to do when no storage estimate is available: "deny" or "unbounded"
quota_fallback = "deny"

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            env_base_url = env::API_BASE_URL,
            base_url = api::DEFAULT_BASE_URL,
            request_timeout = format_duration(http::DEFAULT_TIMEOUT),
            connect_timeout = format_duration(http::CONNECT_TIMEOUT),
            pool_max = http::POOL_MAX_PER_HOST,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries = queue::MAX_RETRIES,
            base_delay = format_duration(queue::RETRY_BASE_DELAY),
            max_delay = format_duration(queue::RETRY_MAX_DELAY),
            persist_interval = format_duration(queue::PROGRESS_PERSIST_INTERVAL),
            env_data_dir = env::DATA_DIR,
            env_budget = env::STORAGE_BUDGET,
            budget = storage::DEFAULT_BUDGET_BYTES,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            ..ClientConfig::default()
        }
    }
}

impl QueueConfigToml {
    /// Convert to runtime QueueConfig
    pub fn to_runtime_config(&self, quota_fallback: QuotaFallback) -> QueueConfig {
        QueueConfigBuilder::new()
            .max_retries(self.max_retries)
            .retry_base_delay(self.retry_base_delay)
            .retry_max_delay(self.retry_max_delay)
            .progress_persist_interval(self.progress_persist_interval)
            .quota_fallback(quota_fallback)
            .build()
    }
}
