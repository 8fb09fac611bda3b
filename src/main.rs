//! BPOM Harvester main entry point
//!
//! This is the command-line interface for the BPOM product registry harvester.

use anyhow::Context;
use bpom_harvester::api::{self, ApiResponse};
use bpom_harvester::config::{load_config_with_hash, Config};
use bpom_harvester::crawler::{crawl_once, serve_schedule, RetryPolicy, RunOutcome};
use bpom_harvester::storage::{JsonStore, Storage};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// BPOM Harvester: an incremental crawler for the BPOM product registry
///
/// Walks the public product listing page by page, normalizes each row, and
/// appends new registrations to a deduplicated JSON store. By default it
/// crawls once at startup and again on every tick of the configured schedule.
#[derive(Parser, Debug)]
#[command(name = "bpom-harvester")]
#[command(version = "1.0.0")]
#[command(about = "An incremental crawler for the BPOM product registry", long_about = None)]
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

    /// Run one supervised crawl and exit
    #[arg(long, group = "mode")]
    once: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Print every stored record and exit
    #[arg(long, group = "mode")]
    list: bool,

    /// Print the record with this registration number and exit
    #[arg(long, value_name = "NUMBER", group = "mode")]
    lookup: Option<String>,

    /// Search stored records by product name and exit
    #[arg(long, value_name = "QUERY", group = "mode")]
    search: Option<String>,

    /// Print store metadata and exit
    #[arg(long, group = "mode")]
    metadata: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }

    let store = JsonStore::new(&config.output.store_path);
    let response = if cli.list {
        Some(api::list_all(&store))
    } else if let Some(number) = &cli.lookup {
        Some(api::get_by_registration(&store, number))
    } else if cli.search.is_some() {
        Some(api::search_by_product(&store, cli.search.as_deref()))
    } else if cli.metadata {
        Some(api::metadata(&store))
    } else {
        None
    };
    if let Some(response) = response {
        return Ok(print_response(&response));
    }

    if cli.once {
        handle_once(&config).await?;
    } else {
        tracing::info!("Serving crawl schedule '{}'", config.crawl.schedule);
        serve_schedule(&config)
            .await
            .context("crawl scheduler stopped")?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bpom_harvester=info,warn"),
            1 => EnvFilter::new("bpom_harvester=debug,info"),
            2 => EnvFilter::new("bpom_harvester=trace,debug"),
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

/// Prints an API envelope and maps its status to the exit code
fn print_response(response: &ApiResponse) -> ExitCode {
    println!("{}", response.to_pretty_json());
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== BPOM Harvester Dry Run ===\n");

    println!("Source:");
    println!("  Listing URL: {}", config.source.base_url);
    match config.source.page_length {
        Some(length) => println!("  Page length: {}", length),
        None => println!("  Page length: site default"),
    }

    println!("\nSelectors:");
    println!("  Table wrapper: {}", config.selectors.table_wrapper);
    println!("  Rows: {}", config.selectors.rows);
    println!("  Next button: {}", config.selectors.next_button);
    println!("  Overlay: {}", config.selectors.overlay);
    println!("  Page length input: {}", config.selectors.page_length_input);

    println!("\nTimeouts:");
    println!("  Table: {:?}", config.timeouts.table());
    println!("  Overlay: {:?}", config.timeouts.overlay());

    let policy = RetryPolicy::from(&config.crawl);
    println!("\nCrawl:");
    println!("  Schedule: {}", config.crawl.schedule);
    println!("  Run at startup: {}", config.crawl.run_at_startup);
    println!("  Retry: {:?}, backoff {:?}", policy.limit, policy.backoff);
    match config.crawl.max_pages {
        0 => println!("  Page cap: none"),
        cap => println!("  Page cap: {}", cap),
    }

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!("  No sandbox: {}", config.browser.no_sandbox);
    if let Some(executable) = &config.browser.executable {
        println!("  Executable: {}", executable);
    }

    let store = JsonStore::new(&config.output.store_path);
    let document = store.read();
    println!("\nOutput:");
    println!("  Store: {}", config.output.store_path);
    println!("  Records stored: {}", document.data.len());
    println!(
        "  Last updated: {}",
        document.last_updated.as_deref().unwrap_or("never")
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the --once mode: one supervised crawl
async fn handle_once(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Starting single crawl of {}", config.source.base_url);

    match crawl_once(config).await.context("crawl failed")? {
        RunOutcome::Completed { report, attempts } => {
            tracing::info!(
                "Crawl completed in {} attempt(s): {} pages, {} rows, \
                 {} new, {} already stored, {} dropped{}",
                attempts,
                report.pages_visited,
                report.rows_seen,
                report.records_appended,
                report.duplicates_skipped,
                report.malformed_dropped,
                if report.page_cap_reached { " (page cap reached)" } else { "" }
            );
        }
        RunOutcome::Skipped => tracing::warn!("Crawl skipped: another crawl is running"),
    }

    Ok(())
}
