mod models;
mod output;
mod scrapers;

use clap::Parser;
use scrapers::types::{DEFAULT_MAX_ITEMS, DEFAULT_URL};
use scrapers::{ClassifiedsBrowserScraper, ExtractionRules, LoaderConfig, ScrapeParams, ScraperTrait};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scrape listings from a classifieds search page into CSV or JSON
#[derive(Debug, Parser)]
#[command(name = "listing-scout", version)]
struct Cli {
    /// Search results URL
    #[arg(short, long, default_value = DEFAULT_URL)]
    url: String,

    /// Output file; a .json extension writes JSON, anything else CSV
    #[arg(short, long, value_name = "FILE", default_value = "results.csv")]
    output: PathBuf,

    /// Maximum number of listings to keep
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Run the browser without a window
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// JSON file overriding the link patterns and field matchers
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Give up on the initial page load after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    nav_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let rules = match &cli.rules {
        Some(path) => {
            info!("Loading extraction rules from {}", path.display());
            ExtractionRules::from_file(path)?
        }
        None => ExtractionRules::default(),
    };

    let loader = LoaderConfig::default()
        .with_navigation_timeout(Duration::from_secs(cli.nav_timeout_secs));

    let scraper = ClassifiedsBrowserScraper::new(ScrapeParams {
        url: cli.url,
        max_items: cli.max_items,
        headless: cli.headless,
    })
    .with_loader_config(loader)
    .with_rules(rules);

    info!("🔎 Scraping {} listings", scraper.source_name());
    let listings = scraper.scrape().await?;

    output::write_results(&listings, &cli.output).await?;

    Ok(())
}
