//! Types for scraping torrent indexers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{ItemId, LibraryError, MediaKind, MediaLibrary};

/// A raw scrape result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedTorrent {
    /// Infohash as returned by the indexer (case not normalized).
    pub infohash: String,
    pub title: String,
}

impl ScrapedTorrent {
    pub fn new(infohash: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            infohash: infohash.into(),
            title: title.into(),
        }
    }
}

/// What part of a title is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScrapeTarget {
    Movie,
    Show,
    Season { season: u32 },
    Episode { season: u32, episode: u32 },
}

/// A single scrape call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// External id of the movie or show.
    pub imdb_id: String,
    pub target: ScrapeTarget,
    /// Label for logs, e.g. `Show S01E02`.
    pub log_string: String,
}

impl ScrapeRequest {
    /// Build the request for `item_id`.
    ///
    /// Returns `None` when neither the item nor its show has an external id.
    pub fn for_item(library: &MediaLibrary, item_id: ItemId) -> Result<Option<Self>, LibraryError> {
        let Some(imdb_id) = library.top_imdb_id(item_id)? else {
            return Ok(None);
        };
        let item = library.item(item_id)?;
        let target = match &item.kind {
            MediaKind::Movie => ScrapeTarget::Movie,
            MediaKind::Show { .. } => ScrapeTarget::Show,
            MediaKind::Season { number, .. } => ScrapeTarget::Season { season: *number },
            MediaKind::Episode { number, season } => ScrapeTarget::Episode {
                season: library.item(*season)?.number().unwrap_or(0),
                episode: *number,
            },
        };
        Ok(Some(Self {
            imdb_id: imdb_id.to_string(),
            target,
            log_string: library.log_string(item_id),
        }))
    }

    /// Stremio-style suffix appended to the id: `:season:episode`.
    ///
    /// Shows ask for the first episode, seasons for their first episode.
    pub fn identifier(&self) -> Option<String> {
        match self.target {
            ScrapeTarget::Movie => None,
            ScrapeTarget::Show => Some(":1:1".to_string()),
            ScrapeTarget::Season { season } => Some(format!(":{}:1", season)),
            ScrapeTarget::Episode { season, episode } => Some(format!(":{}:{}", season, episode)),
        }
    }

    /// `movie` or `series`.
    pub fn scrape_type(&self) -> &'static str {
        match self.target {
            ScrapeTarget::Movie => "movie",
            _ => "series",
        }
    }
}

/// Errors that can occur while scraping.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Scraper connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Scraper request timeout")]
    Timeout,

    #[error("Scrape rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimitExceeded { retry_after_ms: u64 },

    #[error("Scraper API error: {0}")]
    ApiError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// Transport failures and rate limits end the current scrape pass.
    pub fn aborts_pass(&self) -> bool {
        matches!(
            self,
            ScrapeError::ConnectionFailed(_)
                | ScrapeError::Timeout
                | ScrapeError::RateLimitExceeded { .. }
        )
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::ConnectionFailed(_) => "connection_failed",
            ScrapeError::Timeout => "timeout",
            ScrapeError::RateLimitExceeded { .. } => "rate_limited",
            ScrapeError::ApiError(_) => "api_error",
            ScrapeError::Internal(_) => "internal",
        }
    }
}

/// Trait for torrent indexer scrapers.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Scraper name for logging.
    fn name(&self) -> &str;

    /// Fetch candidate torrents for one item.
    async fn scrape(&self, request: &ScrapeRequest) -> Result<Vec<ScrapedTorrent>, ScrapeError>;
}
