//! Inquire main entry point
//!
//! This is the command-line interface for the Inquire link mapper.

use anyhow::{bail, Context};
use clap::Parser;
use inquire::config::{effective_config_hash, load_config_with_hash, validate, validate_seed, Config};
use inquire::crawler::run_crawl;
use inquire::output::{print_status, write_markdown_summary};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Inquire: a seed-driven link mapper
///
/// Inquire crawls outward from a single seed URL, following in-scope links
/// up to a bounded number of fetches, and records every page and link it
/// sees as a graph.
#[derive(Parser, Debug)]
#[command(name = "inquire")]
#[command(version)]
#[command(about = "A seed-driven link mapper", long_about = None)]
struct Cli {
    /// URL to start crawling from (overrides the config file)
    #[arg(value_name = "SEED")]
    seed: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of URLs to schedule (overrides the config file)
    #[arg(short, long, value_name = "N")]
    max_scheduled: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("inquire=info,warn"),
            1 => EnvFilter::new("inquire=debug,info"),
            2 => EnvFilter::new("inquire=trace,debug"),
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

/// Loads the config file if given, then applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(seed) = &cli.seed {
        config.crawler.seed = Some(seed.clone());
    }
    if let Some(max) = cli.max_scheduled {
        config.crawler.max_scheduled = max;
    }

    validate(&config).context("invalid configuration")?;
    match &config.crawler.seed {
        Some(seed) => validate_seed(seed)?,
        None => bail!("no seed URL given; pass SEED or set crawler.seed in the config file"),
    }

    let effective = effective_config_hash(&config).context("failed to hash configuration")?;
    tracing::info!("Effective configuration hash: {}", effective);

    Ok(config)
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Inquire Dry Run ===\n");
    println!("{}", toml::to_string_pretty(config)?);
    println!("User-Agent: {}", config.user_agent.header_value());
    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let summary_path = config.output.summary_path.clone();

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping crawl");
            on_signal.cancel();
        }
    });

    let status = match run_crawl(config, shutdown).await {
        Ok(status) => {
            tracing::info!("Crawl completed successfully");
            status
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_status(&status);

    if let Some(path) = summary_path {
        write_markdown_summary(&status, Path::new(&path))
            .with_context(|| format!("failed to write summary to {}", path))?;
        println!("\n✓ Summary written to: {}", path);
    }

    Ok(())
}
