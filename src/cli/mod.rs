//! Command-line interface components
//!
//! This module contains CLI-specific code for the Lesson Prefetch application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, EnqueueArgs, GlobalArgs, SelectionArgs, TokenAction, TokenArgs};
pub use commands::{
    handle_catalog, handle_clear, handle_enqueue, handle_queue, handle_quota, handle_remove,
    handle_retry, handle_run, handle_token, Services,
};
pub use progress::{ProgressConfig, QueueProgressDisplay};
