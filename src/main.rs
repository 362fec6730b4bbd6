//! Steam-Harvest main entry point
//!
//! This is the command-line interface for the catalog and review harvester.

use anyhow::Context;
use chrono::Datelike;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use steam_harvest::config::{compute_config_hash, read_config, validate, Config};
use steam_harvest::crawler::{crawl_listing, crawl_reviews};
use steam_harvest::extract::{extract_games, extract_reviews};
use steam_harvest::output::{load_status, print_status, write_review_stats};
use steam_harvest::storage::open_ledger;
use steam_harvest::{CompletionPolicy, HarvestError};
use tracing_subscriber::EnvFilter;

/// Exit code for a run that finished but left work behind
const EXIT_PARTIAL: u8 = 2;

/// Steam-Harvest: a resumable catalog and review harvester
///
/// Crawls the store's paginated catalog listing and the review stream of
/// every catalog entry, saving raw pages to disk. Every command can be
/// interrupted and re-run; finished work is never fetched twice.
#[derive(Parser, Debug)]
#[command(name = "steam-harvest")]
#[command(version)]
#[command(about = "A resumable catalog and review harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long, global = true, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Pause after every successful request, in seconds
    #[arg(long, global = true)]
    pause: Option<f64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog listing into raw listing pages
    Games {
        /// Fetch attempts per request, and empty retries per page
        #[arg(long)]
        max_retries: Option<u32>,

        /// First listing page index
        #[arg(long)]
        first_page: Option<u32>,
    },

    /// Crawl the review stream of every item in the item table
    Reviews {
        /// Item table to read (default: <out>/games.csv)
        #[arg(short = 'i', long = "games", value_name = "FILE")]
        item_table: Option<PathBuf>,

        /// Review language; nests item directories under it
        #[arg(long)]
        language: Option<String>,

        /// Only crawl items whose title matches this regular expression
        #[arg(long = "title", value_name = "REGEX")]
        title_filter: Option<String>,

        /// Value of the review `filter` parameter
        #[arg(long)]
        filter: Option<String>,

        /// Fetch attempts per request
        #[arg(long)]
        max_retries: Option<u32>,

        /// Failed fetches tolerated per item
        #[arg(long)]
        max_errors: Option<u32>,

        /// Pack finished items into reviews.zip
        #[arg(long)]
        archive: bool,

        /// Mark items complete even when their stream was aborted
        #[arg(long)]
        complete_on_abort: bool,

        /// Maximum reviews per item (accepted, not enforced)
        #[arg(long)]
        max_reviews: Option<u32>,

        /// Accepted for compatibility; has no effect
        #[arg(long)]
        force: bool,
    },

    /// Build the item table from saved listing pages
    ExtractGames {
        /// Listing page file or directory (default: <out>/pages/games)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Item table to write (default: <out>/games.csv)
        #[arg(long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Build the review table from saved review pages
    ExtractReviews {
        /// Reviews tree (default: <out>/pages/reviews)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Review table to write (default: <out>/reviews.csv)
        #[arg(long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compute statistics over the review table
    Stats {
        /// Review table (default: <out>/reviews.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the JSON files (default: <out>)
        #[arg(long = "output", value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Show runs, outcomes and pending streams from the ledger
    Status {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("steam_harvest=info,warn"),
            1 => EnvFilter::new("steam_harvest=debug,info"),
            2 => EnvFilter::new("steam_harvest=trace,debug"),
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

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = build_config(&cli)?;

    match &cli.command {
        Command::Games { .. } => handle_games(&config).await,
        Command::Reviews { .. } => handle_reviews(&config).await,
        Command::ExtractGames { input, output } => {
            let input = input
                .clone()
                .unwrap_or_else(|| config.output.root.join("pages").join("games"));
            let output = output
                .clone()
                .unwrap_or_else(|| config.output.root.join("games.csv"));
            extract_games(&input, &output)
                .with_context(|| format!("extracting games from {}", input.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ExtractReviews { input, output } => {
            let input = input
                .clone()
                .unwrap_or_else(|| config.output.root.join("pages").join("reviews"));
            let output = output
                .clone()
                .unwrap_or_else(|| config.output.root.join("reviews.csv"));
            let year = chrono::Local::now().year();
            extract_reviews(&input, &output, year)
                .with_context(|| format!("extracting reviews from {}", input.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats { input, output } => {
            let input = input
                .clone()
                .unwrap_or_else(|| config.output.root.join("reviews.csv"));
            let output = output.clone().unwrap_or_else(|| config.output.root.clone());
            write_review_stats(&input, &output)
                .with_context(|| format!("computing statistics from {}", input.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { limit } => handle_status(&config, *limit),
    }
}

/// Builds the effective configuration: file (or defaults), then flags
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            read_config(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(out) = &cli.out {
        config.output.root = out.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.http.timeout_secs = timeout;
    }
    if let Some(pause) = cli.pause {
        config.http.pause_secs = pause;
    }

    match &cli.command {
        Command::Games {
            max_retries,
            first_page,
        } => {
            if let Some(max_retries) = max_retries {
                config.listing.max_retries = *max_retries;
            }
            if let Some(first_page) = first_page {
                config.listing.first_page = *first_page;
            }
        }
        Command::Reviews {
            item_table,
            language,
            title_filter,
            filter,
            max_retries,
            max_errors,
            archive,
            complete_on_abort,
            max_reviews,
            force,
        } => {
            let reviews = &mut config.reviews;
            if item_table.is_some() {
                reviews.item_table = item_table.clone();
            }
            if language.is_some() {
                reviews.language = language.clone();
            }
            if title_filter.is_some() {
                reviews.title_filter = title_filter.clone();
            }
            if let Some(filter) = filter {
                reviews.filter = filter.clone();
            }
            if let Some(max_retries) = max_retries {
                reviews.max_retries = *max_retries;
            }
            if let Some(max_errors) = max_errors {
                reviews.max_errors = *max_errors;
            }
            if *archive {
                reviews.archive = true;
            }
            if *complete_on_abort {
                reviews.completion = CompletionPolicy::AnyExit;
            }
            if max_reviews.is_some() {
                reviews.max_reviews = *max_reviews;
            }
            if *force {
                reviews.force = true;
            }
        }
        _ => {}
    }

    validate(&config).context("invalid configuration")?;
    let hash = compute_config_hash(&config)?;
    tracing::debug!("Configuration hash: {}", hash);

    Ok(config)
}

/// Handles the listing crawl
async fn handle_games(config: &Config) -> anyhow::Result<ExitCode> {
    tracing::info!("Crawling catalog listing into {}", config.output.root.display());

    match crawl_listing(config).await {
        Ok(summary) => {
            tracing::info!(
                "Listing crawl completed: {} pages, {} items",
                summary.pages_saved,
                summary.items_seen
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ HarvestError::ListingStalled { .. }) => {
            tracing::error!("{}", e);
            Ok(ExitCode::from(EXIT_PARTIAL))
        }
        Err(e) => Err(anyhow::Error::new(e).context("listing crawl failed")),
    }
}

/// Handles the review crawl
async fn handle_reviews(config: &Config) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Crawling reviews for {} into {}",
        config.item_table_path().display(),
        config.output.root.display()
    );

    let summary = crawl_reviews(config)
        .await
        .context("review crawl failed")?;

    if summary.is_partial() {
        tracing::warn!(
            "{} items were aborted and will be resumed on the next run",
            summary.aborted
        );
        Ok(ExitCode::from(EXIT_PARTIAL))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Handles the status command: shows the run ledger
fn handle_status(config: &Config, limit: usize) -> anyhow::Result<ExitCode> {
    let path = config.ledger_path();
    println!("Ledger: {}\n", path.display());

    let ledger = open_ledger(&path)
        .with_context(|| format!("opening ledger {}", path.display()))?;
    let status = load_status(&ledger, limit)?;
    print_status(&status);

    Ok(ExitCode::SUCCESS)
}
