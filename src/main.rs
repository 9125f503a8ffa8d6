//! Dinescout main entry point
//!
//! This is the command-line interface for the Dinescout listing harvester.

use anyhow::{bail, Context};
use clap::Parser;
use dinescout::config::{load_config_with_hash, Config};
use dinescout::crawler::{crawl, open_store, ChromiumRenderer, Orchestrator};
use dinescout::output::{default_export_path, export_jsonl, print_locations, print_run_summary};
use dinescout::storage::SnapshotDir;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Dinescout: a resumable restaurant-listing harvester
///
/// Dinescout resolves location names on a travel site, walks their restaurant
/// listings page by page, enriches every listing from its detail page, and
/// stores each page as a JSON snapshot mirrored into SQLite. Pages already on
/// disk are never fetched again.
#[derive(Parser, Debug)]
#[command(name = "dinescout")]
#[command(version)]
#[command(about = "A resumable restaurant-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// CSV file whose first column lists location names (header row skipped)
    #[arg(short, long, value_name = "FILE")]
    locations: Option<PathBuf>,

    /// Location name to crawl; may be repeated
    #[arg(long = "location", value_name = "NAME")]
    names: Vec<String>,

    /// Maximum pages per location; zero or negative crawls every page
    #[arg(short = 'p', long, allow_negative_numbers = true)]
    max_pages: Option<i64>,

    /// Print mirrored locations, resolving any given names not yet known, and exit
    #[arg(long, conflicts_with = "export_jsonl")]
    list_locations: bool,

    /// Flatten all snapshots into one JSON Lines file and exit
    #[arg(long, value_name = "PATH", num_args = 0..=1, conflicts_with = "list_locations")]
    export_jsonl: Option<Option<PathBuf>>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if let Some(dest) = &cli.export_jsonl {
        return handle_export(&config, dest.as_deref());
    }

    let names = collect_names(&cli)?;
    if cli.list_locations {
        return handle_list_locations(config, &names).await;
    }
    if names.is_empty() {
        bail!("No locations given; use --locations FILE or --location NAME");
    }

    let max_pages = cli.max_pages.unwrap_or(config.crawler.max_pages);
    handle_crawl(config, &names, max_pages).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dinescout=info,warn"),
            1 => EnvFilter::new("dinescout=debug,info"),
            2 => EnvFilter::new("dinescout=trace,debug"),
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

/// Gathers location names from the CSV file and `--location` flags, in that order
fn collect_names(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut names = match &cli.locations {
        Some(path) => read_location_file(path)?,
        None => Vec::new(),
    };
    names.extend(
        cli.names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    );
    Ok(names)
}

fn read_location_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read location list {}", path.display()))?;
    Ok(parse_location_list(&content))
}

/// Takes the first column of every row after the header, skipping blanks
fn parse_location_list(content: &str) -> Vec<String> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .map(|cell| cell.trim().trim_matches('"').trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Handles the default mode: crawl every location and print the outcome
async fn handle_crawl(config: Config, names: &[String], max_pages: i64) -> anyhow::Result<()> {
    tracing::info!(
        locations = names.len(),
        max_pages,
        "Starting crawl"
    );

    let summary = crawl(config, names, max_pages)
        .await
        .context("Crawl aborted")?;
    print_run_summary(&summary);

    Ok(())
}

/// Handles --list-locations
///
/// Without names every mirrored location is printed. With names, each is
/// looked up in the mirror and only unknown ones hit the search endpoint.
async fn handle_list_locations(config: Config, names: &[String]) -> anyhow::Result<()> {
    let store = open_store(&config).context("Failed to open the location mirror")?;
    if names.is_empty() {
        print_locations(&store.locations()?);
        return Ok(());
    }

    let renderer = ChromiumRenderer::new(config.browser.clone());
    let mut orchestrator = Orchestrator::new(config, renderer, store)?;

    let mut resolved = Vec::new();
    for (name, result) in orchestrator.lookup_locations(names).await? {
        match result {
            Ok(location) => resolved.push(location),
            Err(e) => eprintln!("{}: {}", name, e),
        }
    }
    print_locations(&resolved);

    Ok(())
}

/// Handles --export-jsonl: flatten snapshots into one file
fn handle_export(config: &Config, dest: Option<&Path>) -> anyhow::Result<()> {
    let snapshots = SnapshotDir::new(&config.output.data_dir);
    let dest = dest
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_export_path(&snapshots));

    let stats = export_jsonl(&snapshots, &dest)
        .with_context(|| format!("Failed to export to {}", dest.display()))?;

    println!(
        "Exported {} listing(s) from {} snapshot(s) to {} ({} duplicate(s) merged)",
        stats.records,
        stats.files,
        dest.display(),
        stats.duplicates
    );
    Ok(())
}
