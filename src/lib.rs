//! Lesson Prefetch Library
//!
//! Offline prefetching of learning-content chunks. Lists downloadable content
//! from a content API, queues it for download and keeps the queue durable,
//! storage-aware and resumable across restarts.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
