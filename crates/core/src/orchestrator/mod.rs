//! Pass orchestration.
//!
//! A scrape pass walks the library, scraping eligible items and storing
//! ranked streams; a download pass resolves scraped items through the debrid
//! provider. The [`Orchestrator`] runs both on their own intervals.

mod download_pass;
mod runner;
mod scrape_pass;
mod types;

pub use download_pass::DownloadPass;
pub use runner::Orchestrator;
pub use scrape_pass::ScrapePass;
pub use types::*;
