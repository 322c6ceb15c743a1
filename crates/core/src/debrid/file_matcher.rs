//! Decides which files of a cached torrent satisfy a media item.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::types::{DebridFile, FileAssignment, FileMatch};
use crate::config::{DownloaderConfig, SizeBounds};
use crate::media::{ItemId, LibraryError, MediaKind, MediaLibrary};
use crate::ranking::{ParsedTitle, TitleRanker};

/// Filters applied to every file before matching.
#[derive(Debug, Clone)]
pub struct FileMatcherConfig {
    /// Files smaller than this many bytes are ignored.
    pub min_file_size: u64,
    /// Accepted extensions, lowercase without the dot.
    pub video_extensions: Vec<String>,
    pub movie_size: SizeBounds,
    pub episode_size: SizeBounds,
}

impl Default for FileMatcherConfig {
    fn default() -> Self {
        Self::from(&DownloaderConfig::default())
    }
}

impl From<&DownloaderConfig> for FileMatcherConfig {
    fn from(config: &DownloaderConfig) -> Self {
        Self {
            min_file_size: config.min_file_size,
            video_extensions: config
                .video_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            movie_size: config.movie_filesize_mb,
            episode_size: config.episode_filesize_mb,
        }
    }
}

/// Matches provider file listings against an item's outstanding coverage.
pub struct FileMatcher {
    ranker: Arc<dyn TitleRanker>,
    config: FileMatcherConfig,
}

struct ParsedFile<'a> {
    file: &'a DebridFile,
    parsed: ParsedTitle,
}

impl FileMatcher {
    pub fn new(ranker: Arc<dyn TitleRanker>, config: FileMatcherConfig) -> Self {
        Self { ranker, config }
    }

    /// Files in `files` that cover what `item_id` still needs.
    ///
    /// Movies and episodes match on the first suitable file. Shows and seasons
    /// only match when every needed episode is covered.
    pub fn find_required_files(
        &self,
        library: &MediaLibrary,
        item_id: ItemId,
        files: &[DebridFile],
        now: DateTime<Utc>,
    ) -> Option<FileMatch> {
        match self.find(library, item_id, files, now) {
            Ok(found) => found,
            Err(e) => {
                warn!(item = %item_id, error = %e, "Cannot match files");
                None
            }
        }
    }

    fn find(
        &self,
        library: &MediaLibrary,
        item_id: ItemId,
        files: &[DebridFile],
        now: DateTime<Utc>,
    ) -> Result<Option<FileMatch>, LibraryError> {
        let item = library.item(item_id)?;
        let bounds = match item.kind {
            MediaKind::Movie => self.config.movie_size,
            _ => self.config.episode_size,
        };
        let candidates = self.candidates(files, bounds);
        if candidates.is_empty() {
            return Ok(None);
        }

        let found = match &item.kind {
            MediaKind::Movie => candidates
                .iter()
                .find(|c| c.parsed.is_movie_like())
                .map(|c| single(item_id, c.file)),
            MediaKind::Show { seasons } => self.match_show(library, seasons, &candidates, now)?,
            MediaKind::Season { number, show, .. } => {
                let single_season_show = library.seasons(*show)?.len() == 1;
                self.match_season(library, item_id, *number, single_season_show, &candidates, now)?
            }
            MediaKind::Episode { number, season } => {
                let season_number = library.item(*season)?.number().unwrap_or(0);
                candidates
                    .iter()
                    .find(|c| {
                        c.parsed.seasons.contains(&season_number)
                            && c.parsed.episodes.contains(number)
                    })
                    .map(|c| single(item_id, c.file))
            }
        };

        if let Some(found) = &found {
            debug!(
                item = %library.log_string(item_id),
                files = found.files.len(),
                "Matched cached files"
            );
        }
        Ok(found)
    }

    fn candidates<'a>(&self, files: &'a [DebridFile], bounds: SizeBounds) -> Vec<ParsedFile<'a>> {
        files
            .iter()
            .filter(|file| file.size >= self.config.min_file_size)
            .filter(|file| bounds.contains(file.size))
            .filter(|file| {
                file.extension()
                    .is_some_and(|ext| self.config.video_extensions.contains(&ext))
            })
            .filter_map(|file| {
                self.ranker
                    .parse(file.basename())
                    .ok()
                    .map(|parsed| ParsedFile { file, parsed })
            })
            .collect()
    }

    fn match_show(
        &self,
        library: &MediaLibrary,
        seasons: &[ItemId],
        candidates: &[ParsedFile<'_>],
        now: DateTime<Utc>,
    ) -> Result<Option<FileMatch>, LibraryError> {
        // season number -> episode number -> episode item
        let mut needed: BTreeMap<u32, HashMap<u32, ItemId>> = BTreeMap::new();
        for season_id in seasons {
            let season = library.item(*season_id)?;
            let number = season.number().unwrap_or(0);
            if number == 0 || season.state.is_satisfied() {
                continue;
            }
            let episodes: HashMap<u32, ItemId> =
                library.needed_episodes(*season_id, now)?.into_iter().collect();
            if !episodes.is_empty() {
                needed.insert(number, episodes);
            }
        }
        if needed.is_empty() {
            return Ok(None);
        }

        let mut found = FileMatch::default();
        for candidate in candidates {
            if candidate.parsed.seasons.is_empty() || candidate.parsed.episodes.is_empty() {
                continue;
            }
            let mut used = false;
            for season in &candidate.parsed.seasons {
                let Some(episodes) = needed.get_mut(season) else {
                    continue;
                };
                for episode in &candidate.parsed.episodes {
                    if let Some(item_id) = episodes.remove(episode) {
                        found.assignments.push(FileAssignment {
                            item_id,
                            file: candidate.file.clone(),
                        });
                        used = true;
                    }
                }
            }
            if used {
                found.files.push(candidate.file.clone());
            }
        }

        let complete = needed.values().all(HashMap::is_empty);
        Ok(complete.then_some(found))
    }

    fn match_season(
        &self,
        library: &MediaLibrary,
        season_id: ItemId,
        number: u32,
        single_season_show: bool,
        candidates: &[ParsedFile<'_>],
        now: DateTime<Utc>,
    ) -> Result<Option<FileMatch>, LibraryError> {
        if number == 0 {
            return Ok(None);
        }
        let mut needed: HashMap<u32, ItemId> =
            library.needed_episodes(season_id, now)?.into_iter().collect();
        let needed_count = needed.len();
        if needed_count == 0 {
            return Ok(None);
        }

        let mut found = FileMatch::default();
        for candidate in candidates {
            let in_season = candidate.parsed.seasons.contains(&number)
                || (single_season_show && candidate.parsed.seasons.is_empty());
            if !in_season {
                continue;
            }
            let mut used = false;
            for episode in &candidate.parsed.episodes {
                if let Some(item_id) = needed.remove(episode) {
                    found.assignments.push(FileAssignment {
                        item_id,
                        file: candidate.file.clone(),
                    });
                    used = true;
                }
            }
            if used {
                found.files.push(candidate.file.clone());
            }
        }

        let exact = needed.is_empty() && found.files.len() == needed_count;
        Ok(exact.then_some(found))
    }
}

fn single(item_id: ItemId, file: &DebridFile) -> FileMatch {
    FileMatch {
        files: vec![file.clone()],
        assignments: vec![FileAssignment {
            item_id,
            file: file.clone(),
        }],
    }
}
