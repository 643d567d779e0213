//! TapMap main entry point
//!
//! This is the command-line interface for the TapMap crawl engine.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tapmap::analysis::{dedup, diff_scans, load_scan, summarize_scan, without_types};
use tapmap::classify::{override_tier, tier_progress, AnthropicClassifier, Enricher};
use tapmap::config::{
    load_config_or_default, load_config_with_hash, Config, CustomTagConfig, ScanRequest,
};
use tapmap::crawler::{create_scan, run_scan, CancelHandle, CrawlEnvironment};
use tapmap::state::{ElementType, ValueTier};
use tapmap::storage::{lock, open_storage, shared, SharedStorage, Storage};
use tracing_subscriber::EnvFilter;

/// TapMap: an interactive-element crawl engine
///
/// TapMap crawls one site politely with a headless browser, records every
/// interactive element with its structural context, and supports
/// deduplication, scan diffs and value-tier classification.
#[derive(Parser, Debug)]
#[command(name = "tapmap")]
#[command(version = "1.0.0")]
#[command(about = "Interactive-element crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and record its interactive elements
    Scan {
        /// Seed URL
        url: String,

        #[arg(long)]
        max_pages: Option<u32>,

        #[arg(long)]
        max_depth: Option<u32>,

        /// Requests per second
        #[arg(long)]
        rate_limit: Option<f64>,

        /// Wall-clock limit in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Name of a custom tag replacing the default taxonomy
        #[arg(long, requires = "keywords")]
        tag_name: Option<String>,

        /// Comma-separated keywords of the custom tag
        #[arg(long, value_delimiter = ',', requires = "tag_name")]
        keywords: Vec<String>,
    },

    /// List scans, newest first
    List,

    /// Show one scan
    Status { scan_id: String },

    /// Show the pages a scan visited, in crawl order
    Pages { scan_id: String },

    /// Show a scan's elements
    Elements {
        scan_id: String,

        /// Collapse identical elements across pages
        #[arg(long)]
        dedup: bool,

        /// Comma-separated element types to leave out
        #[arg(long, value_delimiter = ',', value_parser = parse_element_type)]
        hide_types: Vec<ElementType>,
    },

    /// Summarize a scan's elements
    Summary { scan_id: String },

    /// Compare two finished scans
    Diff {
        /// Baseline scan
        scan_a: String,
        /// Scan compared against the baseline
        scan_b: String,
    },

    /// Assign value tiers to a scan's elements
    Classify {
        scan_id: String,

        /// Only report progress
        #[arg(long)]
        status: bool,
    },

    /// Set one element's value tier by hand
    Override {
        scan_id: String,
        element_id: i64,
        #[arg(value_parser = parse_tier)]
        tier: ValueTier,
        #[arg(long, default_value = "")]
        reason: String,
    },
}

fn parse_element_type(s: &str) -> Result<ElementType, String> {
    ElementType::parse(&s.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("unknown element type '{}'", s))
}

fn parse_tier(s: &str) -> Result<ValueTier, String> {
    ValueTier::parse(s).ok_or_else(|| format!("tier must be HVA, MVA or LVA, got '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(cli.config.as_deref())?;
    let storage = shared(
        open_storage(Path::new(&config.output.database_path))
            .with_context(|| format!("opening database {}", config.output.database_path))?,
    );

    match cli.command {
        Command::Scan {
            url,
            max_pages,
            max_depth,
            rate_limit,
            timeout,
            tag_name,
            keywords,
        } => {
            let request = ScanRequest {
                seed_url: url,
                max_pages,
                max_depth,
                rate_limit,
                timeout_seconds: timeout,
                custom_tag: tag_name.map(|name| CustomTagConfig { name, keywords }),
            };
            handle_scan(config, storage, request).await
        }
        Command::List => print_json(&lock(&storage)?.list_scans()?),
        Command::Status { scan_id } => print_json(&load_scan(&*lock(&storage)?, &scan_id)?),
        Command::Pages { scan_id } => {
            let storage = lock(&storage)?;
            load_scan(&*storage, &scan_id)?;
            print_json(&storage.get_page_visits(&scan_id)?)
        }
        Command::Elements {
            scan_id,
            dedup: collapse,
            hide_types,
        } => {
            let storage = lock(&storage)?;
            load_scan(&*storage, &scan_id)?;
            let elements = without_types(storage.get_elements(&scan_id)?, &hide_types);
            if collapse {
                print_json(&dedup(&elements))
            } else {
                print_json(&elements)
            }
        }
        Command::Summary { scan_id } => print_json(&summarize_scan(&*lock(&storage)?, &scan_id)?),
        Command::Diff { scan_a, scan_b } => {
            print_json(&diff_scans(&*lock(&storage)?, &scan_a, &scan_b)?)
        }
        Command::Classify { scan_id, status } => handle_classify(&config, storage, &scan_id, status).await,
        Command::Override {
            scan_id,
            element_id,
            tier,
            reason,
        } => print_json(&override_tier(&storage, &scan_id, element_id, tier, &reason)?),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tapmap=info,warn"),
            1 => EnvFilter::new("tapmap=debug,info"),
            2 => EnvFilter::new("tapmap=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Ok(load_config_or_default(None)?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one scan in the foreground; Ctrl-C cancels it
async fn handle_scan(config: Config, storage: SharedStorage, request: ScanRequest) -> anyhow::Result<()> {
    let scan = create_scan(&storage, &config, &request)?;
    let env = CrawlEnvironment::new(config, storage.clone())?;

    let cancel = CancelHandle::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let scan_id = scan.id.clone();
    let outcome = run_scan(env, scan, cancel).await?;
    tracing::info!("Scan {} finished as {}", outcome.scan_id, outcome.status);

    print_json(&load_scan(&*lock(&storage)?, &scan_id)?)
}

/// Starts or reports classification of a scan
async fn handle_classify(
    config: &Config,
    storage: SharedStorage,
    scan_id: &str,
    status_only: bool,
) -> anyhow::Result<()> {
    if status_only {
        return print_json(&tier_progress(&storage, scan_id)?);
    }

    let classifier = AnthropicClassifier::from_config(&config.classifier)?;
    tracing::info!("Classifying {} with {}", scan_id, classifier.model());

    let enricher = Enricher::new(storage, Arc::new(classifier), config.classifier.batch_size);
    enricher.start(scan_id)?;
    let status = enricher.wait(scan_id).await?;

    if let Some(error) = &status.last_error {
        print_json(&status)?;
        bail!("classification stopped: {}", error);
    }
    print_json(&status)
}
