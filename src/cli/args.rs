//! Command-line argument parsing for Lesson Prefetch
//!
//! This module defines the CLI structure using clap derive macros,
//! providing commands for browsing the catalog, managing the download
//! queue, running it and storing the API token.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::models::{ContentSelection, Language};

/// Lesson Prefetch - Download learning content for offline use
#[derive(Parser, Debug)]
#[command(
    name = "lesson_prefetch",
    version,
    about = "Prefetch learning content for offline study",
    long_about = "Lists downloadable lesson chunks from a content API and downloads them through a
durable, storage-aware queue that survives restarts and retries failed transfers."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Data directory path (queue record, token and downloaded content)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List downloadable content for a selection
    Catalog(SelectionArgs),

    /// Add content from a selection to the download queue
    Enqueue(EnqueueArgs),

    /// Show the download queue
    Queue,

    /// Remove one item from the download queue
    Remove {
        /// Queue item id (as shown by `queue`)
        #[arg(value_name = "ITEM_ID")]
        item_id: String,
    },

    /// Remove every item from the download queue
    Clear,

    /// Give failed items a fresh retry budget
    Retry,

    /// Show the storage quota
    Quota,

    /// Process the download queue until nothing is pending
    Run,

    /// Manage the API token
    Token(TokenArgs),
}

/// Catalog filter shared by `catalog` and `enqueue`
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Subject name (e.g., "physics")
    #[arg(short, long)]
    pub subject: String,

    /// School grade
    #[arg(short, long)]
    pub grade: u32,

    /// Content language (bangla or english)
    #[arg(short, long, default_value = "english")]
    pub language: Language,

    /// Restrict to one chapter
    #[arg(short, long)]
    pub chapter: Option<u32>,

    /// Restrict to one topic
    #[arg(short, long)]
    pub topic: Option<String>,
}

/// Arguments for the enqueue command
#[derive(Args, Debug, Clone)]
pub struct EnqueueArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Only enqueue these content ids from the selection
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Process the queue after enqueueing and wait until it settles
    #[arg(short, long)]
    pub wait: bool,
}

/// Arguments for token management
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub action: TokenAction,
}

/// Token actions
#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Store the bearer token (prompts when no value is given)
    Set {
        /// Token value
        #[arg(value_name = "TOKEN")]
        value: Option<String>,
    },

    /// Remove the stored token
    Clear,

    /// Show whether a token is stored
    Status,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl SelectionArgs {
    /// Validate argument values clap cannot check
    pub fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("Subject must not be empty".to_string());
        }
        if matches!(&self.topic, Some(topic) if topic.trim().is_empty()) {
            return Err("Topic must not be empty when given".to_string());
        }
        Ok(())
    }

    /// Catalog selection for these arguments
    pub fn selection(&self) -> ContentSelection {
        let mut selection = ContentSelection::new(self.subject.trim(), self.grade, self.language);
        if let Some(chapter) = self.chapter {
            selection = selection.with_chapter(chapter);
        }
        if let Some(topic) = &self.topic {
            selection = selection.with_topic(topic.trim());
        }
        selection
    }
}
