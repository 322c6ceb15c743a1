//! Turns raw scrape results into ranked, admissible streams for one item.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::types::{
    ParsedTitle, RankError, RankReport, RankRequest, RankedTorrent, Stream, TitleRanker,
};
use crate::config::ScrapingConfig;
use crate::media::{ItemId, LibraryError, MediaKind, MediaLibrary};
use crate::metrics;
use crate::scrape::ScrapedTorrent;

/// Tunables for [`CandidateRanker`].
#[derive(Debug, Clone)]
pub struct RankOptions {
    /// Pass the item's aliases to the title ranker.
    pub enable_aliases: bool,
    /// Log every skipped candidate at debug level.
    pub parse_debug: bool,
    pub remove_trash: bool,
    /// How many fewer seasons than needed a show pack may cover.
    pub show_season_tolerance: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            enable_aliases: true,
            parse_debug: false,
            remove_trash: true,
            show_season_tolerance: 1,
        }
    }
}

impl From<&ScrapingConfig> for RankOptions {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            enable_aliases: config.enable_aliases,
            parse_debug: config.parse_debug,
            remove_trash: config.remove_trash,
            show_season_tolerance: config.show_season_tolerance,
        }
    }
}

/// Type-specific admission rule for one requested item.
enum Admission {
    Movie {
        year: Option<i32>,
    },
    Show {
        needed_seasons: usize,
        tolerance: usize,
    },
    Season {
        needed_seasons: BTreeSet<u32>,
    },
    Episode {
        number: u32,
        season_number: u32,
        single_season_show: bool,
        needed_seasons: BTreeSet<u32>,
    },
}

impl Admission {
    fn for_item(
        library: &MediaLibrary,
        item_id: ItemId,
        tolerance: usize,
    ) -> Result<Self, LibraryError> {
        let item = library.item(item_id)?;
        let needed_seasons = library.needed_seasons(item_id)?;
        Ok(match &item.kind {
            MediaKind::Movie => Admission::Movie { year: item.year() },
            MediaKind::Show { .. } => Admission::Show {
                needed_seasons: needed_seasons.len(),
                tolerance,
            },
            MediaKind::Season { .. } => Admission::Season { needed_seasons },
            MediaKind::Episode { number, season } => {
                let show = library.show_of(item_id)?;
                Admission::Episode {
                    number: *number,
                    season_number: library.item(*season)?.number().unwrap_or(0),
                    single_season_show: library.seasons(show)?.len() == 1,
                    needed_seasons,
                }
            }
        })
    }

    fn admits(&self, data: &ParsedTitle) -> bool {
        // A "complete" release satisfies any show, season or episode.
        if data.complete && !matches!(self, Admission::Movie { .. }) {
            return true;
        }

        match self {
            Admission::Movie { year } => match (year, data.year) {
                (Some(year), Some(parsed)) => (year - 1..=year + 1).contains(&parsed),
                _ => false,
            },
            Admission::Show {
                needed_seasons,
                tolerance,
            } => {
                data.is_season_pack()
                    && data.seasons.len() >= needed_seasons.saturating_sub(*tolerance)
            }
            Admission::Season { needed_seasons } => {
                data.is_season_pack() && covers_any(data, needed_seasons)
            }
            Admission::Episode {
                number,
                season_number,
                single_season_show,
                needed_seasons,
            } => {
                let names_episode = data.episodes.contains(number);
                (names_episode && data.seasons.contains(season_number))
                    || (*single_season_show && data.seasons.is_empty() && names_episode)
                    || (data.is_season_pack() && covers_any(data, needed_seasons))
            }
        }
    }
}

fn covers_any(data: &ParsedTitle, needed: &BTreeSet<u32>) -> bool {
    data.seasons.iter().any(|season| needed.contains(season))
}

/// Ranks scrape results against the identity of a media item.
pub struct CandidateRanker {
    ranker: Arc<dyn TitleRanker>,
    options: RankOptions,
}

impl CandidateRanker {
    pub fn new(ranker: Arc<dyn TitleRanker>, options: RankOptions) -> Self {
        Self { ranker, options }
    }

    pub fn options(&self) -> &RankOptions {
        &self.options
    }

    /// Rank `results` for `item_id`.
    ///
    /// Skipped candidates are counted in the report, never returned as errors.
    pub fn rank(
        &self,
        library: &MediaLibrary,
        item_id: ItemId,
        results: &[ScrapedTorrent],
    ) -> Result<RankReport, LibraryError> {
        let log_string = library.log_string(item_id);
        let correct_title = library.top_title(item_id)?;
        let item_country = library.effective_country(item_id)?;
        let is_anime = library.is_anime(item_id)?;
        let admission =
            Admission::for_item(library, item_id, self.options.show_season_tolerance)?;

        let mut aliases: Vec<String> = if self.options.enable_aliases {
            library
                .top_aliases(item_id)?
                .values()
                .flatten()
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        aliases.sort();
        aliases.dedup();

        debug!(
            item = %log_string,
            ranker = self.ranker.name(),
            results = results.len(),
            "Ranking scrape results"
        );

        let mut report = RankReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted: HashMap<String, RankedTorrent> = HashMap::new();

        for result in results {
            let infohash = result.infohash.to_lowercase();
            if !seen.insert(infohash.clone()) {
                report.duplicates += 1;
                continue;
            }
            report.processed += 1;

            let request = RankRequest {
                raw_title: &result.title,
                infohash: &infohash,
                correct_title,
                aliases: &aliases,
                remove_trash: self.options.remove_trash,
            };

            let mut torrent = match self.ranker.rank(&request) {
                Ok(torrent) => torrent,
                Err(RankError::MalformedTitle(reason)) => {
                    report.malformed += 1;
                    self.skipped(&log_string, &result.title, "malformed", &reason);
                    continue;
                }
                Err(RankError::Rejected(reason)) => {
                    report.rejected += 1;
                    self.skipped(&log_string, &result.title, "rejected", &reason);
                    continue;
                }
            };
            torrent.infohash = torrent.infohash.to_lowercase();

            if let (Some(parsed), Some(expected), false) =
                (torrent.data.country.as_deref(), item_country, is_anime)
            {
                if !parsed.eq_ignore_ascii_case(expected) {
                    report.wrong_country += 1;
                    self.skipped(&log_string, &result.title, "wrong_country", parsed);
                    continue;
                }
            }

            if !admission.admits(&torrent.data) {
                report.inadmissible += 1;
                self.skipped(&log_string, &result.title, "inadmissible", "coverage mismatch");
                continue;
            }

            // Rankers may normalize the hash, so distinct inputs can collide.
            if accepted.contains_key(&torrent.infohash) {
                report.processed -= 1;
                report.duplicates += 1;
                continue;
            }
            accepted.insert(torrent.infohash.clone(), torrent);
        }

        let mut ranked: Vec<RankedTorrent> = accepted.into_values().collect();
        ranked.sort_by(|a, b| self.ranker.compare(a, b));
        report.streams = ranked.into_iter().map(Stream::from_ranked).collect();

        record_outcomes(&report);
        if report.accepted() > 0 {
            info!(
                item = %log_string,
                accepted = report.accepted(),
                processed = report.processed,
                "Ranked candidates"
            );
        }

        Ok(report)
    }

    fn skipped(&self, item: &str, title: &str, outcome: &str, reason: &str) {
        if self.options.parse_debug {
            debug!(item = %item, title = %title, outcome, reason, "Skipping candidate");
        }
    }
}

fn record_outcomes(report: &RankReport) {
    let counter = &metrics::CANDIDATES_RANKED;
    counter
        .with_label_values(&["accepted"])
        .inc_by(report.accepted() as u64);
    counter
        .with_label_values(&["duplicate"])
        .inc_by(report.duplicates as u64);
    counter
        .with_label_values(&["malformed"])
        .inc_by(report.malformed as u64);
    counter
        .with_label_values(&["rejected"])
        .inc_by(report.rejected as u64);
    counter
        .with_label_values(&["wrong_country"])
        .inc_by(report.wrong_country as u64);
    counter
        .with_label_values(&["inadmissible"])
        .inc_by(report.inadmissible as u64);
}
