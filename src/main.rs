//! Lesson Prefetch CLI application
//!
//! Command-line interface for prefetching learning content for offline use.
//! Lists content from the content API, queues it and downloads it with
//! storage-aware admission, retries and progress tracking.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lesson_prefetch::cli::{
    handle_catalog, handle_clear, handle_enqueue, handle_queue, handle_quota, handle_remove,
    handle_retry, handle_run, handle_token, Cli, Commands, Services,
};
use lesson_prefetch::config::AppConfig;
use lesson_prefetch::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.global.config.is_none() {
        AppConfig::initialize_first_run().await?;
    }
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config)?;

    info!("Lesson Prefetch v{} starting", env!("CARGO_PKG_VERSION"));

    let services = Services::build(&config, cli.global.data_dir.clone()).await?;

    match cli.command {
        Commands::Catalog(args) => handle_catalog(&services, args).await,
        Commands::Enqueue(args) => handle_enqueue(&services, args).await,
        Commands::Queue => handle_queue(&services).await,
        Commands::Remove { item_id } => handle_remove(&services, &item_id).await,
        Commands::Clear => handle_clear(&services).await,
        Commands::Retry => handle_retry(&services).await,
        Commands::Quota => handle_quota(&services).await,
        Commands::Run => {
            info!("Executing run command");
            handle_run(&services).await
        }
        Commands::Token(args) => handle_token(&services, args).await,
    }
}

/// Initialize logging from CLI verbosity flags, falling back to the config level
fn init_logging(cli: &Cli, config: &AppConfig) -> Result<()> {
    let global = &cli.global;
    let level = if global.quiet || global.verbose || global.very_verbose {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.clone()
    };

    let directive = format!("lesson_prefetch={}", level)
        .parse()
        .map_err(|e| AppError::generic(format!("Invalid log level '{}': {}", level, e)))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(global.very_verbose) // Show levels only in very verbose mode
        .init();

    if global.very_verbose {
        info!("Very verbose logging enabled");
    } else if global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}
