//! Types for the media item tree.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an item inside a [`MediaLibrary`](super::MediaLibrary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a media item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Unknown,
    /// Known to the catalog, metadata not complete yet.
    Indexed,
    /// In the library and waiting for a source.
    Content,
    /// Candidate streams were found and stored.
    Scraped,
    /// A cached source was selected and enqueued with the debrid provider.
    Downloaded,
    /// Some, but not all, children are complete.
    PartiallyCompleted,
    Completed,
    Failed,
}

impl ItemState {
    /// Returns the string representation for logs and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Unknown => "unknown",
            ItemState::Indexed => "indexed",
            ItemState::Content => "content",
            ItemState::Scraped => "scraped",
            ItemState::Downloaded => "downloaded",
            ItemState::PartiallyCompleted => "partially_completed",
            ItemState::Completed => "completed",
            ItemState::Failed => "failed",
        }
    }

    /// Whether the item no longer needs a source.
    ///
    /// A downloaded item already has its source selected, so it does not count
    /// towards the coverage still needed by its parent.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ItemState::Downloaded | ItemState::Completed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific data of a media item.
///
/// Parent links are [`ItemId`]s into the owning library, never owning pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Show {
        /// Seasons ordered by number.
        seasons: Vec<ItemId>,
    },
    Season {
        number: u32,
        show: ItemId,
        /// Episodes ordered by number.
        episodes: Vec<ItemId>,
    },
    Episode {
        number: u32,
        season: ItemId,
    },
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show { .. } => "show",
            MediaKind::Season { .. } => "season",
            MediaKind::Episode { .. } => "episode",
        }
    }

    /// Season or episode number, if this is a season or an episode.
    pub fn number(&self) -> Option<u32> {
        match self {
            MediaKind::Season { number, .. } | MediaKind::Episode { number, .. } => Some(*number),
            _ => None,
        }
    }
}

/// The debrid torrent an item's file was selected from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStream {
    pub infohash: String,
    pub torrent_id: String,
}

/// A movie, show, season or episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: ItemId,
    pub kind: MediaKind,
    pub title: String,
    /// External identity (IMDB-style id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Alternative titles keyed by country code.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub aliases: HashMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Anime releases are exempt from the country filter.
    #[serde(default)]
    pub is_anime: bool,
    pub state: ItemState,
    /// `None` means the item was never scraped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_stream: Option<ActiveStream>,
    /// File selected for this item inside the active stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl MediaItem {
    pub(crate) fn new(id: ItemId, kind: MediaKind, details: ItemDetails) -> Self {
        Self {
            id,
            kind,
            title: details.title,
            imdb_id: details.imdb_id,
            aliases: details.aliases,
            aired_at: details.aired_at,
            country: details.country,
            is_anime: details.is_anime,
            state: details.state,
            scraped_at: None,
            active_stream: None,
            file: None,
        }
    }

    pub fn number(&self) -> Option<u32> {
        self.kind.number()
    }

    /// Year the item aired, if known.
    pub fn year(&self) -> Option<i32> {
        self.aired_at.map(|aired| aired.year())
    }

    /// Whether the item aired strictly before `now`.
    pub fn is_released(&self, now: DateTime<Utc>) -> bool {
        self.aired_at.is_some_and(|aired| aired < now)
    }
}

/// Descriptive fields used when adding an item to a library.
#[derive(Debug, Clone, Default)]
pub struct ItemDetails {
    pub title: String,
    pub imdb_id: Option<String>,
    pub aliases: HashMap<String, Vec<String>>,
    pub aired_at: Option<DateTime<Utc>>,
    pub country: Option<String>,
    pub is_anime: bool,
    pub state: ItemState,
}

impl ItemDetails {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn with_alias(mut self, country: impl Into<String>, title: impl Into<String>) -> Self {
        self.aliases
            .entry(country.into())
            .or_default()
            .push(title.into());
        self
    }

    pub fn aired(mut self, aired_at: DateTime<Utc>) -> Self {
        self.aired_at = Some(aired_at);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn anime(mut self, is_anime: bool) -> Self {
        self.is_anime = is_anime;
        self
    }

    pub fn with_state(mut self, state: ItemState) -> Self {
        self.state = state;
        self
    }
}

/// Errors raised by library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Unknown media item: {0}")]
    UnknownItem(ItemId),

    #[error("Item {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ItemId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Number {number} already exists under {parent}")]
    DuplicateNumber { parent: ItemId, number: u32 },

    #[error("Library I/O error: {0}")]
    Io(String),

    #[error("Library serialization error: {0}")]
    Serialization(String),
}
