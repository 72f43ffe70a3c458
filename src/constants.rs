//! Application constants for Lesson Prefetch
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Base URL of the content API
    pub const API_BASE_URL: &str = "PREFETCH_API_BASE_URL";

    /// Directory holding the blob store (queue record, token, downloaded content)
    pub const DATA_DIR: &str = "PREFETCH_DATA_DIR";

    /// Storage budget in bytes shared by all downloaded content
    pub const STORAGE_BUDGET: &str = "PREFETCH_STORAGE_BUDGET";
}

/// Well-known keys in the durable key-value store
pub mod keys {
    /// Key of the persisted download queue record
    pub const DOWNLOAD_QUEUE: &str = "download-queue";

    /// Key of the opaque bearer token
    pub const TOKEN: &str = "token";

    /// Prefix under which downloaded content bytes are stored
    pub const CONTENT_PREFIX: &str = "content";

    /// Blob key for the bytes of one content item
    ///
    /// The id is form-encoded into a single key segment, so separators and
    /// reserved characters in ids cannot nest or escape the prefix. A leading
    /// dot is escaped as well, which keeps `.` and `..` ids from becoming
    /// dot segments.
    pub fn content(content_id: &str) -> String {
        let mut segment: String =
            url::form_urlencoded::byte_serialize(content_id.as_bytes()).collect();
        if segment.starts_with('.') {
            segment.replace_range(..1, "%2E");
        }
        format!("{}/{}", CONTENT_PREFIX, segment)
    }
}

/// Content API endpoints
pub mod api {
    /// Default base URL for the content API
    pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

    /// Catalog listing path, relative to the base URL
    pub const AVAILABLE_CONTENT_PATH: &str = "content/available";

    /// Path segments of the byte transfer endpoint for one content item,
    /// appended to the base URL; each one is percent-encoded on the way in
    pub fn download_segments(content_id: &str) -> [&str; 3] {
        ["content", content_id, "download"]
    }
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Lesson-Prefetch/0.1.0 (Offline Learning Content)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 4;
}

/// Rate limiting configuration
pub mod limits {
    /// Default rate limit for API requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;
}

/// Queue and retry policy
pub mod queue {
    use super::Duration;

    /// Attempts allowed per item before it is terminally failed
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay before the first retry
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

    /// Upper bound on any retry delay
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

    /// Exponential multiplier applied per failed attempt
    pub const RETRY_MULTIPLIER: u32 = 2;

    /// Jitter applied to retry delays (fraction of the delay)
    pub const RETRY_JITTER: f64 = 0.1;

    /// Minimum interval between persisted progress writes
    pub const PROGRESS_PERSIST_INTERVAL: Duration = Duration::from_secs(1);

    /// Buffer size of the executor progress channel
    pub const PROGRESS_BUFFER_SIZE: usize = 64;

    /// Prefix of `lastError` for admission failures
    pub const INSUFFICIENT_STORAGE_ERROR: &str = "Insufficient storage";
}

/// Storage constants
pub mod storage {
    /// Temporary file suffix for atomic writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Data directory name under the platform data dir
    pub const DATA_DIR_NAME: &str = "lesson-prefetch";

    /// Default storage budget (0 = bounded only by free disk space)
    pub const DEFAULT_BUDGET_BYTES: u64 = 0;

    /// Bytes in one mebibyte
    pub const MIB: u64 = 1024 * 1024;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

pub use http::USER_AGENT;
pub use queue::MAX_RETRIES;
