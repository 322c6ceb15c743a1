//! Scraping torrent indexers.
//!
//! [`should_scrape`] decides which items are due, [`ScrapeRateLimiter`]
//! bounds the outbound calls, and [`Scraper`] implementations fetch the raw
//! `(infohash, title)` results.

mod eligibility;
mod rate_limiter;
mod torrentio;
mod types;

pub use eligibility::{cooldown_elapsed, should_scrape, DEFAULT_SCRAPE_COOLDOWN};
pub use rate_limiter::{ScrapeRateLimiter, TokenBucket};
pub use torrentio::TorrentioScraper;
pub use types::*;
