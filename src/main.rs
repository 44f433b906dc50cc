//! Wallcrawl main entry point
//!
//! This is the command-line interface for the Wallcrawl comment harvester.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wallcrawl::api::VkClient;
use wallcrawl::config::{load_access_token, load_config_with_hash, load_sources, Config};
use wallcrawl::output::{load_statistics, log_summary, print_statistics};
use wallcrawl::storage::open_store;
use wallcrawl::{CheckpointLedger, Orchestrator};

/// Wallcrawl: a resumable comment-feed harvester
///
/// Wallcrawl walks the walls of many groups at once, stores every post,
/// comment and comment author it finds, and resumes where it stopped when
/// interrupted.
#[derive(Parser, Debug)]
#[command(name = "wallcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable comment-feed harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "recount"])]
    dry_run: bool,

    /// Show progress and counters from the store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "recount"])]
    stats: bool,

    /// Recompute the counters from the stored records and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    recount: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config).await?;
    } else if cli.recount {
        handle_recount(&config).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wallcrawl=info,warn"),
            1 => EnvFilter::new("wallcrawl=debug,info"),
            2 => EnvFilter::new("wallcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let sources = load_sources(&config.input.sources_path)?;
    let token = load_access_token(&config.api);

    println!("=== Wallcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request interval: {}ms", config.crawler.request_interval_ms);
    println!("  Page size: {}", config.crawler.page_size);
    println!(
        "  Rate limit cooldown: {}s",
        config.crawler.rate_limit_cooldown_secs
    );
    println!("  Transient retry: {:?}", config.crawler.transient_retry);
    println!("  Flush interval: {}s", config.crawler.flush_interval_secs);

    println!("\nAPI:");
    println!("  Endpoint: {}", config.api.base_url);
    println!("  Version: {}", config.api.version);
    match &token {
        Ok(_) => println!("  Access token: found"),
        Err(e) => println!("  Access token: {}", e),
    }

    println!("\nOutput:");
    println!("  Backend: {:?}", config.output.backend);
    println!("  Data directory: {}", config.output.data_dir.display());

    println!("\nSources ({}):", sources.len());
    for source in &sources {
        println!("  - {}", source);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling {} sources", sources.len());

    token?;
    Ok(())
}

/// Handles the --stats mode: shows progress and counters from the store
async fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config.output)?;
    let stats = load_statistics(store).await?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --recount mode: rebuilds the counter snapshot from disk
async fn handle_recount(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config.output)?;
    let ledger = CheckpointLedger::new(store);
    let counters = ledger.recount().await?;
    println!("✓ Counters rebuilt: {}", counters);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let names = load_sources(&config.input.sources_path)?;
    let token = load_access_token(&config.api)?;
    tracing::info!("Sources configured: {}", names.len());

    let client = Arc::new(VkClient::new(
        &config.api,
        token,
        config.crawler.request_timeout(),
    )?);
    let store = open_store(&config.output)?;
    let orchestrator = Orchestrator::new(&config.crawler, client.clone(), client, store);

    let shutdown = orchestrator.cancellation_token();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing up");
        shutdown.cancel();
    });

    match orchestrator.run(&names).await {
        Ok(summary) => {
            log_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Resolves on SIGINT, or on SIGTERM where available
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
