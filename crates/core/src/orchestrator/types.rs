//! Types for the pass orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::media::LibraryError;
use crate::store::StoreError;

/// Errors that stop a pass. Scraper and debrid failures never do; they are
/// recorded in the pass summary instead.
#[derive(Debug, Error)]
pub enum PassError {
    /// Stream store error.
    #[error("stream store error: {0}")]
    Store(#[from] StoreError),

    /// Media library error.
    #[error("media library error: {0}")]
    Library(#[from] LibraryError),
}

/// Outcome of one scrape pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    /// Scraper calls made.
    pub requests: usize,
    /// Items that got at least one accepted stream.
    pub items_with_streams: usize,
    /// Accepted streams across all items.
    pub streams_accepted: usize,
    /// Streams not seen before for their item.
    pub streams_new: usize,
    /// Items scraped without any accepted stream.
    pub items_without_streams: usize,
    /// Eligible items that have no external id to scrape by.
    pub items_without_id: usize,
    /// Non-fatal scraper errors.
    pub errors: usize,
    /// Set when a rate limit or transport failure cut the pass short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl ScrapeSummary {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Outcome of one download pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Items handed to the resolver.
    pub items_considered: usize,
    /// Items that got a selection.
    pub selected: usize,
    /// Items with no cached stream covering them.
    pub unresolved: usize,
    /// Items sent back to `Content` because every stream is blacklisted.
    pub exhausted: usize,
    /// Streams blacklisted during this pass.
    pub blacklisted: usize,
    /// Items skipped after a debrid transport failure.
    pub transport_errors: usize,
}

/// Both passes of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub scrape: ScrapeSummary,
    pub download: DownloadSummary,
}
