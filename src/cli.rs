use std::path::PathBuf;

use clap::Parser;

use crate::config::CrawlConfig;

#[derive(Debug, Parser)]
#[command(name = "offi-scrape", about = "Polite crawler for offi.fr theatre listings")]
pub struct Cli {
    /// Seed URLs for a breadth-first crawl
    #[arg(long, num_args = 1..)]
    pub seeds: Vec<String>,
    /// Listing URL to paginate instead of crawling from seeds
    #[arg(long)]
    pub listing_url: Option<String>,
    /// Query parameter carrying the page number
    #[arg(long)]
    pub page_param: Option<String>,
    /// JSONL file records are appended to
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Upper bound on fetched pages
    #[arg(short = 'n', long)]
    pub max_pages: Option<usize>,
    /// Only follow listing links under the seeds' paths
    #[arg(long)]
    pub same_path: bool,
    /// Only follow listing links under this path (repeatable)
    #[arg(long = "path-prefix")]
    pub path_prefixes: Vec<String>,
    /// User-Agent header, also the robots.txt identity
    #[arg(long)]
    pub ua: Option<String>,
    /// Minimum seconds between requests
    #[arg(long)]
    pub min_delay: Option<f64>,
    /// Maximum seconds between requests
    #[arg(long)]
    pub max_delay: Option<f64>,
    /// Retries on server errors
    #[arg(long)]
    pub retries: Option<u32>,
    /// JSON config file (defaults to config.json in the data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Keep paginating past a page without new records
    #[arg(long)]
    pub no_early_stop: bool,
}

impl Cli {
    /// Applies the flags that were given on top of `config`.
    pub fn apply(self, config: &mut CrawlConfig) {
        if !self.seeds.is_empty() {
            config.seeds = self.seeds;
        }
        if let Some(listing) = self.listing_url {
            config.listing_url = Some(listing);
        }
        if let Some(param) = self.page_param {
            config.page_param = param;
        }
        if let Some(out) = self.out {
            config.output = Some(out);
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if self.same_path {
            config.same_path = true;
        }
        config.path_prefixes.extend(self.path_prefixes);
        if let Some(ua) = self.ua {
            config.user_agent = ua;
        }
        if let Some(min) = self.min_delay {
            config.min_delay_secs = min;
        }
        if let Some(max) = self.max_delay {
            config.max_delay_secs = max;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if self.no_early_stop {
            config.stop_on_empty_page = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "offi-scrape",
            "--seeds",
            "https://www.offi.fr/theatre/programme.html",
            "https://www.offi.fr/theatre/agenda.html",
            "--max-pages",
            "10",
            "--min-delay",
            "0.5",
            "--path-prefix",
            "/theatre/programme",
            "--no-early-stop",
        ])
        .expect("parse");
        let mut config = CrawlConfig {
            max_delay_secs: 4.0,
            ..Default::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.min_delay_secs, 0.5);
        assert_eq!(config.max_delay_secs, 4.0);
        assert_eq!(config.path_prefixes, vec!["/theatre/programme"]);
        assert!(!config.stop_on_empty_page);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let cli = Cli::try_parse_from(["offi-scrape"]).expect("parse");
        let mut config = CrawlConfig {
            listing_url: Some("https://www.offi.fr/theatre/programme.html".into()),
            max_pages: 7,
            ..Default::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.max_pages, 7);
        assert!(config.seeds.is_empty());
        assert!(config.stop_on_empty_page);
    }
}
