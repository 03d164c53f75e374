use anyhow::{Context, Result};
use reqwest::Url;

use super::fetcher::{FetchError, Page, PageFetcher};
use super::frontier::{Frontier, FrontierEntry, Source};
use crate::config::{CrawlConfig, CrawlMode};
use crate::scraping::urls::UrlKind;
use crate::scraping::Extractor;
use crate::store::RecordSink;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub records_emitted: usize,
    pub empty_records: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Single-threaded crawl loop: one request in flight, every URL fetched at most once.
pub struct Crawler<F, S> {
    extractor: Extractor,
    fetcher: F,
    sink: S,
    frontier: Frontier,
    stats: CrawlStats,
    requests: usize,
    max_pages: usize,
    prefixes: Vec<String>,
    stop_on_empty_page: bool,
}

impl<F: PageFetcher, S: RecordSink> Crawler<F, S> {
    pub fn new(config: &CrawlConfig, extractor: Extractor, fetcher: F, sink: S) -> Self {
        Self {
            extractor,
            fetcher,
            sink,
            frontier: Frontier::new(),
            stats: CrawlStats::default(),
            requests: 0,
            max_pages: config.max_pages,
            prefixes: config.allowed_prefixes(),
            stop_on_empty_page: config.stop_on_empty_page,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Crawls until the frontier is exhausted, the page budget is spent or pagination runs dry.
    /// Only a failing sink aborts the run.
    pub fn run(&mut self, mode: &CrawlMode) -> Result<CrawlStats> {
        match mode {
            CrawlMode::Seeds(seeds) => self.crawl_seeds(seeds)?,
            CrawlMode::Pagination {
                listing,
                page_param,
                first_page,
            } => self.crawl_pages(listing, page_param, *first_page)?,
        }
        Ok(self.stats)
    }

    fn crawl_seeds(&mut self, seeds: &[Url]) -> Result<()> {
        for seed in seeds {
            let Some(url) = self.extractor.classifier().canonicalize(seed.as_str()) else {
                log::warn!("ignoring seed {seed}");
                continue;
            };
            self.frontier.push(FrontierEntry {
                url,
                source: Source::Seed,
                link_text: None,
            });
        }

        while let Some(entry) = self.frontier.pop() {
            if self.budget_spent() {
                log::info!("page budget of {} reached", self.max_pages);
                break;
            }
            let Ok(page) = self.fetch(&entry) else {
                continue;
            };
            if self.extractor.classifier().classify(&entry.url) == UrlKind::Show {
                self.emit(&entry, &page)?;
            } else {
                let queued = self.enqueue_links(&page, true);
                log::info!("{}: {queued} new links queued", entry.url);
            }
        }
        Ok(())
    }

    fn crawl_pages(&mut self, listing: &Url, page_param: &str, first_page: u32) -> Result<()> {
        let mut number = first_page;
        while !self.budget_spent() {
            let listing_entry = FrontierEntry {
                url: page_url(listing, page_param, number),
                source: Source::Pagination(number),
                link_text: None,
            };
            if !self.frontier.mark_seen(&listing_entry.url) {
                break;
            }
            let page = match self.fetch(&listing_entry) {
                Ok(page) => page,
                Err(FetchError::Disallowed | FetchError::Blocked) => break,
                Err(_) => {
                    number += 1;
                    continue;
                }
            };
            let queued = self.enqueue_links(&page, false);
            log::info!("{}: page {number}, {queued} new shows", listing_entry.url);

            let mut emitted = 0;
            while let Some(entry) = self.frontier.pop() {
                if self.budget_spent() {
                    log::info!("page budget of {} reached", self.max_pages);
                    return Ok(());
                }
                let Ok(detail) = self.fetch(&entry) else {
                    continue;
                };
                if self.emit(&entry, &detail)? {
                    emitted += 1;
                }
            }

            if emitted == 0 && number > first_page && self.stop_on_empty_page {
                log::info!("no new records on page {number}, assuming the listing is exhausted");
                break;
            }
            number += 1;
        }
        Ok(())
    }

    /// Queues unseen show links, and listing links too when `follow_listings` is set.
    fn enqueue_links(&mut self, page: &Page, follow_listings: bool) -> usize {
        let mut queued = 0;
        for link in self.extractor.discover_links(&page.url, &page.body) {
            let wanted = match link.kind {
                UrlKind::Show => true,
                _ if follow_listings => {
                    self.extractor.classifier().is_listing(&link.url) && self.within_prefixes(&link.url)
                }
                _ => false,
            };
            if !wanted {
                log::debug!("not following {}", link.url);
                continue;
            }
            let entry = FrontierEntry {
                url: link.url,
                source: Source::Discovered,
                link_text: link.text,
            };
            if self.frontier.push(entry) {
                queued += 1;
            }
        }
        queued
    }

    fn within_prefixes(&self, url: &Url) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| url.path().starts_with(p.as_str()))
    }

    fn budget_spent(&self) -> bool {
        self.requests >= self.max_pages
    }

    /// Fetches one page and books the outcome. Robots and blocked-path skips cost no budget.
    fn fetch(&mut self, entry: &FrontierEntry) -> Result<Page, FetchError> {
        let url = &entry.url;
        log::debug!("fetching {url} ({:?})", entry.source);
        let result = self.fetcher.fetch(url);
        match &result {
            Ok(_) => {
                self.requests += 1;
                self.stats.pages_fetched += 1;
            }
            Err(err @ (FetchError::Disallowed | FetchError::Blocked)) => {
                self.stats.skipped += 1;
                log::debug!("skipping {url}: {err}");
            }
            Err(err) if err.is_policy() => {
                self.requests += 1;
                self.stats.skipped += 1;
                log::info!("skipping {url}: {err}");
            }
            Err(err) => {
                self.requests += 1;
                self.stats.failed += 1;
                log::warn!("failed {url}: {err}");
            }
        }
        result
    }

    /// Extracts and stores the record of a show page. Returns whether it was kept.
    fn emit(&mut self, entry: &FrontierEntry, page: &Page) -> Result<bool> {
        let record = self
            .extractor
            .parse_detail(&entry.url, &page.body, entry.link_text.as_deref());
        if record.is_empty() {
            self.stats.empty_records += 1;
            log::debug!("discarding near-empty record for {}", entry.url);
            return Ok(false);
        }
        self.sink
            .append(&record)
            .with_context(|| format!("unable to store record for {}", entry.url))?;
        self.stats.records_emitted += 1;
        log::info!(
            "{}: {}",
            entry.url,
            record.title.as_deref().unwrap_or("(untitled)")
        );
        Ok(true)
    }
}

/// The listing URL with its page parameter set to `number`.
pub fn page_url(listing: &Url, param: &str, number: u32) -> Url {
    let mut url = listing.clone();
    url.set_fragment(None);
    let kept: Vec<(String, String)> = listing
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &number.to_string());
    url
}
