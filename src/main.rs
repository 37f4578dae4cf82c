//! Tender-Sweep main entry point
//!
//! This is the command-line interface for the Tender-Sweep aggregator.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tender_sweep::config::{load_config_with_hash, Config};
use tender_sweep::output::print_summary;
use tender_sweep::storage::{open_store, DocumentStore};
use tender_sweep::{Coordinator, OutcomeStatus};
use tracing_subscriber::EnvFilter;

/// Tender-Sweep: a tender notice aggregator
///
/// Tender-Sweep fetches tender listings from the configured institutional
/// sites, normalizes them, and replaces each source's stored snapshot.
#[derive(Parser, Debug)]
#[command(name = "tender-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A tender notice aggregator", long_about = None)]
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

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// Show stored document counts per destination and exit
    #[arg(long, conflicts_with = "dry_run")]
    list: bool,

    /// Only process this source (repeatable)
    #[arg(long, value_name = "KEY")]
    only: Vec<String>,

    /// Write the JSON run summary here instead of `output.summary-path`
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.only)?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.list {
        // Store drivers may block, keep them off the async workers
        tokio::task::spawn_blocking(move || handle_list(&config))
            .await
            .context("listing task failed")??;
        return Ok(ExitCode::SUCCESS);
    }

    let summary_path = cli
        .summary
        .clone()
        .or_else(|| config.output.summary_path.as_ref().map(PathBuf::from));

    handle_run(config, config_hash, cli.only, summary_path.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tender_sweep=info,warn"),
            1 => EnvFilter::new("tender_sweep=debug,info"),
            2 => EnvFilter::new("tender_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the fetch plan
fn handle_dry_run(config: &Config, only: &[String]) -> anyhow::Result<()> {
    println!("=== Tender-Sweep Dry Run ===\n");

    println!("Fetch defaults:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!(
        "  Timeouts: connect {}s, read {}s",
        config.fetch.connect_timeout_secs, config.fetch.read_timeout_secs
    );
    println!(
        "  Attempts: {} (backoff base {}ms, retry on {:?})",
        config.fetch.max_attempts, config.fetch.backoff_base_ms, config.fetch.retryable_statuses
    );

    println!("\nPipeline:");
    println!(
        "  Max concurrent sources: {}",
        config.pipeline.max_concurrent_sources
    );
    println!("  Max pages per source: {}", config.pipeline.max_pages);
    println!("  Store: {}", config.storage.connection);

    for key in only {
        if config.source(key).is_none() {
            anyhow::bail!("unknown source key '{}'", key);
        }
    }
    let sources: Vec<_> = config
        .sources
        .iter()
        .filter(|source| only.is_empty() || only.contains(&source.key))
        .collect();

    println!("\nSources ({}):", sources.len());
    for source in &sources {
        let mut flags = Vec::new();
        if !source.paginate {
            flags.push("no-paginate");
        }
        if source.legacy_tls {
            flags.push("legacy-tls");
        }
        println!(
            "  - {} [{}] -> {} {}",
            source.key,
            source.adapter.kind,
            source.destination,
            if flags.is_empty() {
                String::new()
            } else {
                format!("({})", flags.join(", "))
            }
        );
        println!("    * {}", source.start_url);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --list mode: shows stored document counts
fn handle_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.storage.connection)
        .with_context(|| format!("failed to open store {}", config.storage.connection))?;

    println!("Store: {}\n", config.storage.connection);
    for source in &config.sources {
        let count = store.count(&source.destination)?;
        println!("  {:<24} {:>6}", source.destination, count);
    }

    let configured: Vec<&str> = config.sources.iter().map(|s| s.destination.as_str()).collect();
    let orphaned: Vec<(String, usize)> = store
        .collections()?
        .into_iter()
        .filter(|(name, _)| !configured.contains(&name.as_str()))
        .collect();

    if !orphaned.is_empty() {
        println!("\nCollections without a configured source:");
        for (name, count) in orphaned {
            println!("  {:<24} {:>6}", name, count);
        }
    }

    Ok(())
}

/// Handles the main run
async fn handle_run(
    config: Config,
    config_hash: String,
    only: Vec<String>,
    summary_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let coordinator = Coordinator::new(config)
        .await
        .context("failed to initialize run")?
        .with_config_hash(config_hash)
        .with_only(only)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling all sources");
            cancel.cancel();
        }
    });

    let summary = coordinator.run().await;

    if let Some(path) = summary_path {
        summary
            .write_json(path)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        tracing::info!("Summary written to {}", path.display());
    }

    print_summary(&summary);

    let counts = summary.status_counts();
    if counts[&OutcomeStatus::Fatal] > 0 {
        Ok(ExitCode::from(2))
    } else if counts[&OutcomeStatus::PartialFailure] > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
