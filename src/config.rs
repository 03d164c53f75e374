use std::{fs, path::Path, path::PathBuf, time::Duration};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("invalid section: {0}")]
    Section(String),
    #[error("invalid delays: min {min}s must be >= 0 and <= max {max}s")]
    Delays { min: f64, max: f64 },
    #[error("max_pages must be at least 1")]
    MaxPages,
    #[error("give either seed urls or a listing url, not both")]
    ConflictingMode,
    #[error("no seed urls and no listing url given")]
    MissingMode,
    #[error("unable to read config {path:?}: {reason}")]
    File { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    pub section: String,
    pub seeds: Vec<String>,
    pub listing_url: Option<String>,
    pub page_param: String,
    pub first_page: u32,
    pub output: Option<PathBuf>,
    pub max_pages: usize,
    pub same_path: bool,
    pub path_prefixes: Vec<String>,
    pub user_agent: String,
    pub accept_language: String,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub max_retries: u32,
    pub retry_backoff_secs: f64,
    pub timeout_secs: u64,
    pub max_body_bytes: u64,
    pub blocked_paths: Vec<String>,
    pub stop_on_empty_page: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.offi.fr".to_string(),
            section: "theatre".to_string(),
            seeds: Vec::new(),
            listing_url: None,
            page_param: "npage".to_string(),
            first_page: 1,
            output: None,
            max_pages: 200,
            same_path: false,
            path_prefixes: Vec::new(),
            user_agent: "OffiTheatreScraper/1.0 (+https://example.org; contact: you@example.org)"
                .to_string(),
            accept_language: "fr,fr-FR;q=0.9,en;q=0.8".to_string(),
            min_delay_secs: 1.0,
            max_delay_secs: 2.5,
            max_retries: 2,
            retry_backoff_secs: 2.0,
            timeout_secs: 15,
            max_body_bytes: 5_000_000,
            blocked_paths: vec!["/connexion.html".to_string()],
            stop_on_empty_page: true,
        }
    }
}

/// How the crawl finds its pages.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlMode {
    /// Breadth-first from explicit seeds.
    Seeds(Vec<Url>),
    /// Numbered listing pages, shows only.
    Pagination {
        listing: Url,
        page_param: String,
        first_page: u32,
    },
}

impl CrawlConfig {
    /// Reads a JSON config file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file_error = |reason: String| ConfigError::File {
            path: path.to_path_buf(),
            reason,
        };
        let contents = fs::read_to_string(path).map_err(|err| file_error(err.to_string()))?;
        serde_json::from_str(&contents).map_err(|err| file_error(err.to_string()))
    }

    /// The explicit file if given, else `config.json` in the data directory, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = utils::config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn base(&self) -> Result<Url, ConfigError> {
        parse_url(&self.base_url)
    }

    pub fn mode(&self) -> Result<CrawlMode, ConfigError> {
        match (self.seeds.is_empty(), &self.listing_url) {
            (false, Some(_)) => Err(ConfigError::ConflictingMode),
            (true, None) => Err(ConfigError::MissingMode),
            (false, None) => {
                let seeds = self
                    .seeds
                    .iter()
                    .map(|s| parse_url(s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CrawlMode::Seeds(seeds))
            }
            (true, Some(listing)) => Ok(CrawlMode::Pagination {
                listing: parse_url(listing)?,
                page_param: self.page_param.clone(),
                first_page: self.first_page,
            }),
        }
    }

    /// Checks everything that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base()?;
        self.mode()?;
        if self.max_pages == 0 {
            return Err(ConfigError::MaxPages);
        }
        let (min, max) = (self.min_delay_secs, self.max_delay_secs);
        if !(is_duration(min) && is_duration(max)) || min > max {
            return Err(ConfigError::Delays { min, max });
        }
        // retries wait `backoff * attempt`, so the longest pause must fit too
        let backoff = self.retry_backoff_secs;
        if !is_duration(backoff * f64::from(self.max_retries.max(1))) {
            return Err(ConfigError::Delays {
                min: backoff,
                max: backoff,
            });
        }
        Ok(())
    }

    /// Path prefixes that listing links must stay under; derived from the seeds with `same_path`.
    pub fn allowed_prefixes(&self) -> Vec<String> {
        let mut prefixes = self.path_prefixes.clone();
        if self.same_path {
            for seed in &self.seeds {
                if let Ok(url) = Url::parse(seed) {
                    let path = url.path().trim_end_matches('/');
                    prefixes.push(if path.is_empty() { "/" } else { path }.to_string());
                }
            }
        }
        prefixes
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| utils::data_root().join("offi.jsonl"))
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_secs_f64(self.min_delay_secs.max(0.0))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_secs.max(self.min_delay_secs).max(0.0))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs.max(0.0))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn is_duration(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::Url {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Url {
            url: raw.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"seeds": ["https://www.offi.fr/theatre/programme.html"], "max_pages": 5}"#)
            .expect("write config");
        let config = CrawlConfig::load(&path).expect("load config");
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.section, "theatre");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mode_requires_exactly_one_source() {
        let mut config = CrawlConfig::default();
        assert!(matches!(config.mode(), Err(ConfigError::MissingMode)));
        config.listing_url = Some("https://www.offi.fr/theatre/programme.html".into());
        assert!(matches!(config.mode(), Ok(CrawlMode::Pagination { first_page: 1, .. })));
        config.seeds = vec!["https://www.offi.fr/theatre/".into()];
        assert!(matches!(config.mode(), Err(ConfigError::ConflictingMode)));
    }

    #[test]
    fn rejects_bad_delays_and_urls() {
        let mut config = CrawlConfig {
            seeds: vec!["https://www.offi.fr/theatre/".into()],
            min_delay_secs: 3.0,
            max_delay_secs: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Delays { .. })));
        config.min_delay_secs = 0.5;
        config.seeds = vec!["ftp://offi.fr".into()];
        assert!(matches!(config.validate(), Err(ConfigError::Url { .. })));
        config.seeds = vec!["https://www.offi.fr/theatre/".into()];
        config.max_pages = 0;
        assert!(matches!(config.validate(), Err(ConfigError::MaxPages)));
    }

    #[test]
    fn rejects_delays_too_large_for_a_duration() {
        let mut config = CrawlConfig {
            seeds: vec!["https://www.offi.fr/theatre/".into()],
            max_delay_secs: 1e300,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Delays { .. })));
        config.max_delay_secs = f64::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::Delays { .. })));
        config.max_delay_secs = 2.5;
        config.retry_backoff_secs = 1e300;
        assert!(matches!(config.validate(), Err(ConfigError::Delays { .. })));
        config.retry_backoff_secs = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Delays { .. })));
        config.retry_backoff_secs = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn same_path_uses_seed_paths() {
        let config = CrawlConfig {
            seeds: vec!["https://www.offi.fr/theatre/".into()],
            same_path: true,
            path_prefixes: vec!["/theatre/programme".into()],
            ..Default::default()
        };
        assert_eq!(config.allowed_prefixes(), vec!["/theatre/programme", "/theatre"]);
    }
}
