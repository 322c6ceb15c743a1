//! Types for debrid provider operations.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{ItemId, LibraryError};

/// A file inside a torrent, as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebridFile {
    /// Path within the torrent.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl DebridFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// File name without its directories.
    pub fn basename(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name)
    }

    /// Lowercase extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        let base = self.basename();
        base.rfind('.')
            .filter(|idx| *idx > 0)
            .map(|idx| base[idx + 1..].to_lowercase())
    }
}

/// A torrent the provider already has in its cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTorrent {
    /// Lowercase hex infohash.
    pub infohash: String,
    pub name: String,
    pub size: u64,
    pub files: Vec<DebridFile>,
}

/// Provider-assigned torrent id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(pub String);

impl TorrentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Download status of a torrent on the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebridTorrentStatus {
    Queued,
    Downloading,
    /// Available for streaming or download.
    Completed,
    Failed,
    Unknown,
}

impl DebridTorrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebridTorrentStatus::Queued => "queued",
            DebridTorrentStatus::Downloading => "downloading",
            DebridTorrentStatus::Completed => "completed",
            DebridTorrentStatus::Failed => "failed",
            DebridTorrentStatus::Unknown => "unknown",
        }
    }
}

/// A torrent in the user's provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebridTorrentInfo {
    pub id: TorrentId,
    pub infohash: String,
    pub name: String,
    pub size: u64,
    pub status: DebridTorrentStatus,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    #[serde(default)]
    pub files: Vec<DebridFile>,
}

/// Errors that can occur during debrid operations.
#[derive(Debug, Error)]
pub enum DebridError {
    #[error("Debrid connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Debrid request timeout")]
    Timeout,

    #[error("Debrid authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Debrid API error: {0}")]
    ApiError(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DebridError {
    /// Network level failure; the item is retried next cycle.
    pub fn is_transport(&self) -> bool {
        matches!(self, DebridError::ConnectionFailed(_) | DebridError::Timeout)
    }
}

/// Trait for debrid providers.
#[async_trait]
pub trait DebridProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Look up cached torrents. Hashes missing from the result are not cached.
    ///
    /// Keys of the returned map are lowercase infohashes.
    async fn check_cached(
        &self,
        infohashes: &[String],
    ) -> Result<HashMap<String, CachedTorrent>, DebridError>;

    /// Add a torrent to the account by infohash.
    async fn add_torrent(&self, infohash: &str) -> Result<TorrentId, DebridError>;

    async fn get_torrent_info(&self, id: &TorrentId) -> Result<DebridTorrentInfo, DebridError>;

    async fn delete_torrent(&self, id: &TorrentId) -> Result<(), DebridError>;
}

/// A file chosen for one media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAssignment {
    pub item_id: ItemId,
    pub file: DebridFile,
}

/// Files of a cached torrent that cover what an item needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMatch {
    pub files: Vec<DebridFile>,
    pub assignments: Vec<FileAssignment>,
}

impl FileMatch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A resolved download: the torrent was added to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub item_id: ItemId,
    pub infohash: String,
    pub torrent_id: TorrentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_name: Option<String>,
    pub files: Vec<DebridFile>,
    pub assignments: Vec<FileAssignment>,
}

/// Errors that abort resolution of one item.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Debrid transport error: {0}")]
    Transport(#[source] DebridError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}
