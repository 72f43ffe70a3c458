//! Error types for Lesson Prefetch
//!
//! Errors returned to callers of explicit operations live here. Failures that
//! happen during background queue processing are not raised at all: they are
//! captured on the affected `QueueItem` and never interrupt the driver.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used to carry transport failures through unchanged
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Content catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog answered with a non-success status
    #[error("Failed to fetch available content: {status_text}")]
    FetchFailed { status: u16, status_text: String },

    /// No response was received; the underlying error is passed through
    #[error(transparent)]
    Transport(BoxError),

    /// Catalog URL could not be built
    #[error("Invalid catalog URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Catalog body was not `{ content: [...] }`
    #[error("Catalog response could not be parsed")]
    InvalidBody(#[from] serde_json::Error),
}

impl CatalogError {
    /// Wrap any transport failure without altering its message
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }
}

/// Errors from a single download attempt
#[derive(Error, Debug)]
pub enum TransferError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Received byte count differs from the expected size
    #[error("Size mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Downloaded bytes could not be stored
    #[error("Failed to store content: {0}")]
    Storage(#[from] StoreError),

    /// Transfer was cancelled before completion
    #[error("Transfer cancelled")]
    Cancelled,

    /// Generic error for other issues
    #[error("{0}")]
    Other(String),
}

/// Durable key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error on the backing directory
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty, absolute or escapes the store root
    #[error("Invalid store key: {key}")]
    InvalidKey { key: String },
}

/// Storage quota errors
#[derive(Error, Debug)]
pub enum QuotaError {
    /// Host offers no storage estimate and the fallback policy denies
    #[error("Storage estimate unavailable on this host")]
    Unavailable,

    /// Estimate could not be read
    #[error("Storage estimate failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Queue manager errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Manager was torn down with `destroy()`
    #[error("Download queue has been destroyed")]
    Destroyed,

    /// Queue record could not be persisted
    #[error("Failed to persist download queue: {0}")]
    Persistence(#[from] StoreError),

    /// Catalog lookup failed; the catalog error is passed through
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Storage quota could not be computed
    #[error(transparent)]
    Quota(#[from] QuotaError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// HTTP client could not be built from the configuration
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Config directory could not be determined or written
    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Quota error
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Queue error
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Catalog(CatalogError::FetchFailed { .. })
            | AppError::Catalog(CatalogError::Transport(_))
            | AppError::Queue(QueueError::Catalog(CatalogError::FetchFailed { .. }))
            | AppError::Queue(QueueError::Catalog(CatalogError::Transport(_)))
            | AppError::Transfer(TransferError::Http(_))
            | AppError::Transfer(TransferError::ServerError { .. })
            | AppError::Quota(QuotaError::Io(_)) => true,

            AppError::Queue(QueueError::Destroyed)
            | AppError::Config(_)
            | AppError::Catalog(CatalogError::InvalidUrl { .. }) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Catalog(_) => "catalog",
            AppError::Transfer(_) => "transfer",
            AppError::Store(_) => "store",
            AppError::Quota(_) => "quota",
            AppError::Queue(_) => "queue",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Quota result type alias
pub type QuotaResult<T> = std::result::Result<T, QuotaError>;

/// Queue result type alias
pub type QueueResult<T> = std::result::Result<T, QueueError>;
