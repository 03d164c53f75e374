pub mod cli;
pub mod config;
pub mod crawl;
pub mod models;
pub mod scraping;
pub mod store;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use config::CrawlConfig;
use crawl::{Crawler, Fetcher};
use scraping::urls::UrlClassifier;
use scraping::Extractor;
use store::JsonlStore;

/// Parses the command line, crawls, and appends records to the output file.
pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = CrawlConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    let mode = config.mode()?;

    let classifier = UrlClassifier::new(config.base()?, &config.section, config.blocked_paths.clone())?;
    let fetcher = Fetcher::new(&config).context("unable to build http client")?;
    let output = config.output_path();
    let store = JsonlStore::open(&output)?;
    log::info!("appending records to {}", output.display());

    let mut crawler = Crawler::new(&config, Extractor::new(classifier), fetcher, store);
    let stats = crawler.run(&mode)?;
    log::info!(
        "done: {} pages fetched, {} records written to {}, {} empty records discarded, {} skipped, {} failed",
        stats.pages_fetched,
        crawler.sink().written(),
        crawler.sink().path().display(),
        stats.empty_records,
        stats.skipped,
        stats.failed
    );
    Ok(())
}
