//! Mock debrid provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::debrid::{
    CachedTorrent, DebridError, DebridProvider, DebridTorrentInfo, DebridTorrentStatus,
    TorrentId,
};

/// Mock implementation of the DebridProvider trait.
///
/// Provides controllable behavior for testing:
/// - Configure which infohashes are cached and their file listings
/// - Track availability queries, added and deleted torrents
/// - Simulate failures per operation
///
/// # Example
///
/// ```rust,ignore
/// use cachehound_core::testing::{MockDebrid, fixtures};
///
/// let debrid = MockDebrid::new();
/// debrid.add_cached(fixtures::cached_torrent("abc", &[("Movie.mkv", 4_000_000_000)])).await;
///
/// let cached = debrid.check_cached(&["abc".into(), "def".into()]).await?;
/// assert_eq!(cached.len(), 1);
/// assert_eq!(debrid.check_calls().await.len(), 1);
/// ```
pub struct MockDebrid {
    /// Cached torrents keyed by lowercase infohash.
    cache: Arc<RwLock<HashMap<String, CachedTorrent>>>,
    /// Hashes of every availability query.
    check_calls: Arc<RwLock<Vec<Vec<String>>>>,
    /// Torrents added, keyed by id.
    torrents: Arc<RwLock<HashMap<TorrentId, String>>>,
    /// Infohashes in the order they were added.
    added: Arc<RwLock<Vec<String>>>,
    deleted: Arc<RwLock<Vec<TorrentId>>>,
    /// If set, the next availability query fails with this error.
    next_check_error: Arc<RwLock<Option<DebridError>>>,
    /// Per-infohash add failures, consumed on use.
    add_errors: Arc<RwLock<HashMap<String, DebridError>>>,
    /// If set, the next info lookup fails with this error.
    next_info_error: Arc<RwLock<Option<DebridError>>>,
    next_id: Arc<RwLock<u64>>,
}

impl std::fmt::Debug for MockDebrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDebrid")
            .field("cache", &"<cache>")
            .field("check_calls", &"<check_calls>")
            .field("torrents", &"<torrents>")
            .field("next_check_error", &"<next_check_error>")
            .field("add_errors", &"<add_errors>")
            .field("next_info_error", &"<next_info_error>")
            .finish()
    }
}

impl Default for MockDebrid {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDebrid {
    /// Create a new mock provider with an empty cache.
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            check_calls: Arc::new(RwLock::new(Vec::new())),
            torrents: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            next_check_error: Arc::new(RwLock::new(None)),
            add_errors: Arc::new(RwLock::new(HashMap::new())),
            next_info_error: Arc::new(RwLock::new(None)),
            next_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Mark a torrent as cached.
    pub async fn add_cached(&self, torrent: CachedTorrent) {
        self.cache
            .write()
            .await
            .insert(torrent.infohash.to_lowercase(), torrent);
    }

    /// Make the next availability query fail.
    pub async fn set_check_error(&self, error: DebridError) {
        *self.next_check_error.write().await = Some(error);
    }

    /// Make the next add of `infohash` fail.
    pub async fn set_add_error(&self, infohash: &str, error: DebridError) {
        self.add_errors
            .write()
            .await
            .insert(infohash.to_lowercase(), error);
    }

    /// Make the next info lookup fail.
    pub async fn set_info_error(&self, error: DebridError) {
        *self.next_info_error.write().await = Some(error);
    }

    /// Hashes of every availability query, in call order.
    pub async fn check_calls(&self) -> Vec<Vec<String>> {
        self.check_calls.read().await.clone()
    }

    /// Infohashes successfully added, in call order.
    pub async fn added(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    pub async fn deleted(&self) -> Vec<TorrentId> {
        self.deleted.read().await.clone()
    }
}

#[async_trait]
impl DebridProvider for MockDebrid {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check_cached(
        &self,
        infohashes: &[String],
    ) -> Result<HashMap<String, CachedTorrent>, DebridError> {
        self.check_calls.write().await.push(infohashes.to_vec());

        if let Some(error) = self.next_check_error.write().await.take() {
            return Err(error);
        }

        let cache = self.cache.read().await;
        Ok(infohashes
            .iter()
            .filter_map(|hash| {
                let key = hash.to_lowercase();
                cache.get(&key).map(|torrent| (key, torrent.clone()))
            })
            .collect())
    }

    async fn add_torrent(&self, infohash: &str) -> Result<TorrentId, DebridError> {
        let infohash = infohash.to_lowercase();
        if let Some(error) = self.add_errors.write().await.remove(&infohash) {
            return Err(error);
        }

        let id = {
            let mut next_id = self.next_id.write().await;
            let id = TorrentId::new(format!("mock-{}", *next_id));
            *next_id += 1;
            id
        };
        self.torrents.write().await.insert(id.clone(), infohash.clone());
        self.added.write().await.push(infohash);
        Ok(id)
    }

    async fn get_torrent_info(&self, id: &TorrentId) -> Result<DebridTorrentInfo, DebridError> {
        if let Some(error) = self.next_info_error.write().await.take() {
            return Err(error);
        }

        let infohash = self
            .torrents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DebridError::TorrentNotFound(id.to_string()))?;
        let cached = self.cache.read().await.get(&infohash).cloned();

        Ok(match cached {
            Some(torrent) => DebridTorrentInfo {
                id: id.clone(),
                infohash,
                name: torrent.name,
                size: torrent.size,
                status: DebridTorrentStatus::Completed,
                progress: 1.0,
                files: torrent.files,
            },
            None => DebridTorrentInfo {
                id: id.clone(),
                infohash,
                name: String::new(),
                size: 0,
                status: DebridTorrentStatus::Queued,
                progress: 0.0,
                files: Vec::new(),
            },
        })
    }

    async fn delete_torrent(&self, id: &TorrentId) -> Result<(), DebridError> {
        if self.torrents.write().await.remove(id).is_none() {
            return Err(DebridError::TorrentNotFound(id.to_string()));
        }
        self.deleted.write().await.push(id.clone());
        Ok(())
    }
}
