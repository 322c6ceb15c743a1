//! The download pass: scraped items → stored streams → availability resolver.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::types::{DownloadSummary, PassError};
use crate::debrid::{AvailabilityResolver, ResolveError};
use crate::media::{ItemId, ItemState, MediaKind, MediaLibrary};
use crate::metrics;
use crate::store::StreamStore;

/// Resolves every item that has streams waiting, sequentially.
pub struct DownloadPass {
    resolver: AvailabilityResolver,
}

impl DownloadPass {
    pub fn new(resolver: AvailabilityResolver) -> Self {
        Self { resolver }
    }

    pub async fn run(
        &self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
    ) -> Result<DownloadSummary, PassError> {
        self.run_at(library, store, Utc::now()).await
    }

    /// Run the pass as if the current time were `now`.
    ///
    /// Items are visited depth-first: a show with stored streams first, then
    /// its `Scraped` seasons, then their `Scraped` episodes. Anything covered
    /// by an earlier selection is skipped.
    pub async fn run_at(
        &self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
        now: DateTime<Utc>,
    ) -> Result<DownloadSummary, PassError> {
        let started = Instant::now();
        let mut summary = DownloadSummary::default();

        for id in library.root_ids() {
            let is_show = matches!(library.item(id)?.kind, MediaKind::Show { .. });
            if !is_show {
                if library.item(id)?.state == ItemState::Scraped {
                    self.resolve_item(library, store, id, now, &mut summary).await?;
                }
                continue;
            }

            let show_state = library.item(id)?.state;
            if matches!(show_state, ItemState::Content | ItemState::PartiallyCompleted)
                && store.count_streams(id)? > 0
            {
                self.resolve_item(library, store, id, now, &mut summary).await?;
            }

            for season in library.seasons(id)?.to_vec() {
                if library.item(season)?.state == ItemState::Scraped {
                    self.resolve_item(library, store, season, now, &mut summary).await?;
                }
                for episode in library.episodes(season)?.to_vec() {
                    if library.item(episode)?.state == ItemState::Scraped {
                        self.resolve_item(library, store, episode, now, &mut summary)
                            .await?;
                    }
                }
            }
        }

        metrics::PASS_DURATION
            .with_label_values(&["download"])
            .observe(started.elapsed().as_secs_f64());
        info!(
            considered = summary.items_considered,
            selected = summary.selected,
            unresolved = summary.unresolved,
            blacklisted = summary.blacklisted,
            transport_errors = summary.transport_errors,
            "Download pass complete"
        );
        Ok(summary)
    }

    async fn resolve_item(
        &self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
        id: ItemId,
        now: DateTime<Utc>,
        summary: &mut DownloadSummary,
    ) -> Result<(), PassError> {
        let mut streams = store.load_streams(id)?;
        if streams.is_empty() {
            debug!(item = %library.log_string(id), "No stored streams");
            return Ok(());
        }
        summary.items_considered += 1;

        let flagged: Vec<bool> = streams.iter().map(|s| s.blacklisted).collect();
        let result = self.resolver.resolve(library, id, &mut streams, now).await;

        for (stream, was_blacklisted) in streams.iter().zip(flagged) {
            if stream.blacklisted && !was_blacklisted && store.blacklist(id, &stream.infohash)? {
                summary.blacklisted += 1;
            }
        }

        match result {
            Ok(Some(selection)) => {
                library.apply_selection(&selection)?;
                summary.selected += 1;
                info!(
                    item = %library.log_string(id),
                    infohash = %selection.infohash,
                    files = selection.files.len(),
                    "Applied selection"
                );
            }
            Ok(None) => {
                summary.unresolved += 1;
                let item = library.item(id)?;
                if item.state == ItemState::Scraped && streams.iter().all(|s| s.blacklisted) {
                    library.set_state(id, ItemState::Content)?;
                    summary.exhausted += 1;
                    debug!(item = %library.log_string(id), "Every stream blacklisted, back to scraping");
                }
            }
            Err(ResolveError::Transport(e)) => {
                summary.transport_errors += 1;
                warn!(item = %library.log_string(id), error = %e, "Debrid unreachable, retrying next cycle");
            }
            Err(ResolveError::Library(e)) => return Err(e.into()),
        }
        Ok(())
    }
}
