pub mod driver;
pub mod fetcher;
pub mod frontier;
pub mod politeness;

pub use driver::{CrawlStats, Crawler};
pub use fetcher::{FetchError, Fetcher, Page, PageFetcher};
