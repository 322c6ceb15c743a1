//! Resolves ranked streams into a download through a debrid provider.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::file_matcher::FileMatcher;
use super::types::{
    CachedTorrent, DebridError, DebridProvider, FileMatch, ResolveError, Selection,
};
use crate::media::{ItemId, MediaLibrary};
use crate::metrics;
use crate::ranking::Stream;

/// Default number of infohashes per availability query.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Walks ranked streams in batches and selects the first cached torrent whose
/// files cover the item.
pub struct AvailabilityResolver {
    debrid: Arc<dyn DebridProvider>,
    matcher: FileMatcher,
    batch_size: usize,
}

impl AvailabilityResolver {
    pub fn new(debrid: Arc<dyn DebridProvider>, matcher: FileMatcher, batch_size: usize) -> Self {
        Self {
            debrid,
            matcher,
            batch_size: batch_size.max(1),
        }
    }

    /// Resolve `item_id` from `streams`, best first.
    ///
    /// Streams found uncached are blacklisted in place; the caller persists
    /// the flags. A transport failure aborts this item only.
    pub async fn resolve(
        &self,
        library: &MediaLibrary,
        item_id: ItemId,
        streams: &mut [Stream],
        now: DateTime<Utc>,
    ) -> Result<Option<Selection>, ResolveError> {
        library.item(item_id)?;
        let log_string = library.log_string(item_id);
        let mut processed: HashSet<String> = HashSet::new();
        let mut cursor = 0;

        loop {
            let mut batch: Vec<(usize, String)> = Vec::with_capacity(self.batch_size);
            while cursor < streams.len() && batch.len() < self.batch_size {
                let index = cursor;
                cursor += 1;
                let stream = &streams[index];
                if stream.blacklisted {
                    continue;
                }
                let infohash = stream.infohash.to_lowercase();
                if processed.insert(infohash.clone()) {
                    batch.push((index, infohash));
                }
            }
            if batch.is_empty() {
                break;
            }

            let cached = self.check_cached(&log_string, &batch).await?;
            if cached.is_empty() {
                debug!(item = %log_string, batch = batch.len(), "No cached streams in batch");
                for (index, _) in &batch {
                    blacklist(&mut streams[*index]);
                }
                continue;
            }

            for (index, infohash) in &batch {
                if !cached.contains_key(infohash) {
                    blacklist(&mut streams[*index]);
                }
            }

            for (index, infohash) in &batch {
                let Some(entry) = cached.get(infohash) else {
                    continue;
                };
                let Some(found) =
                    self.matcher
                        .find_required_files(library, item_id, &entry.files, now)
                else {
                    debug!(item = %log_string, infohash = %infohash, "Cached torrent does not cover item");
                    continue;
                };

                match self.finalize(item_id, entry, found).await {
                    Ok(selection) => {
                        metrics::SELECTIONS.inc();
                        info!(
                            item = %log_string,
                            infohash = %infohash,
                            torrent_id = %selection.torrent_id,
                            files = selection.files.len(),
                            "Selected cached stream"
                        );
                        return Ok(Some(selection));
                    }
                    Err(e) if e.is_transport() => return Err(ResolveError::Transport(e)),
                    Err(e) => {
                        warn!(item = %log_string, infohash = %infohash, error = %e, "Failed to add cached stream");
                        blacklist(&mut streams[*index]);
                    }
                }
            }
        }

        debug!(item = %log_string, "No cached stream covers item");
        Ok(None)
    }

    async fn check_cached(
        &self,
        log_string: &str,
        batch: &[(usize, String)],
    ) -> Result<HashMap<String, CachedTorrent>, ResolveError> {
        let hashes: Vec<String> = batch.iter().map(|(_, hash)| hash.clone()).collect();
        metrics::AVAILABILITY_QUERIES.inc();

        match self.debrid.check_cached(&hashes).await {
            Ok(cached) => Ok(cached
                .into_iter()
                .map(|(hash, entry)| (hash.to_lowercase(), entry))
                .collect()),
            Err(e) if e.is_transport() => Err(ResolveError::Transport(e)),
            Err(e) => {
                warn!(item = %log_string, error = %e, "Availability check failed, treating batch as uncached");
                Ok(HashMap::new())
            }
        }
    }

    /// Add the torrent and confirm it exists on the provider.
    async fn finalize(
        &self,
        item_id: ItemId,
        entry: &CachedTorrent,
        found: FileMatch,
    ) -> Result<Selection, DebridError> {
        let torrent_id = self.debrid.add_torrent(&entry.infohash).await?;

        let info = match self.debrid.get_torrent_info(&torrent_id).await {
            Ok(info) => info,
            Err(e) => {
                if let Err(delete_err) = self.debrid.delete_torrent(&torrent_id).await {
                    warn!(torrent_id = %torrent_id, error = %delete_err, "Failed to delete torrent");
                }
                return Err(e);
            }
        };

        let torrent_name = if info.name.is_empty() {
            entry.name.clone()
        } else {
            info.name
        };

        Ok(Selection {
            item_id,
            infohash: entry.infohash.to_lowercase(),
            torrent_id,
            torrent_name: Some(torrent_name),
            files: found.files,
            assignments: found.assignments,
        })
    }
}

fn blacklist(stream: &mut Stream) {
    if stream.blacklist() {
        metrics::STREAMS_BLACKLISTED.inc();
    }
}
