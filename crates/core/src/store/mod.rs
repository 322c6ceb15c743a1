//! Persistent stream storage.
//!
//! Ranked streams are stored per media item so the download pass can pick
//! them up later, and so blacklisting survives restarts.

mod sqlite;

pub use sqlite::SqliteStreamStore;

use thiserror::Error;

use crate::media::ItemId;
use crate::ranking::Stream;

/// Errors from the stream store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for stream storage.
pub trait StreamStore: Send + Sync {
    /// Insert or update streams for an item.
    ///
    /// Existing rows keep their blacklisted flag; a stream can only become
    /// blacklisted, never un-blacklisted. Returns the number of new rows.
    fn save_streams(&self, item: ItemId, streams: &[Stream]) -> Result<usize, StoreError>;

    /// All streams of an item, best rank first.
    fn load_streams(&self, item: ItemId) -> Result<Vec<Stream>, StoreError>;

    fn count_streams(&self, item: ItemId) -> Result<usize, StoreError>;

    /// Blacklist one stream. Returns `true` if the flag was newly set.
    fn blacklist(&self, item: ItemId, infohash: &str) -> Result<bool, StoreError>;

    fn blacklisted_count(&self, item: ItemId) -> Result<usize, StoreError>;
}
