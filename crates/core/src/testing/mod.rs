//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits
//! and a scripted title ranker, so passes can be exercised without network
//! access.
//!
//! # Example
//!
//! ```rust,ignore
//! use cachehound_core::testing::{fixtures, MockDebrid, MockScraper};
//!
//! let scraper = MockScraper::new();
//! let debrid = MockDebrid::new();
//!
//! // Configure mock responses
//! scraper.set_results(vec![fixtures::scraped("abc", "Movie.2019.1080p")]).await;
//! debrid.add_cached(fixtures::cached_torrent("abc", &[("Movie.2019.1080p.mkv", 4_000_000_000)])).await;
//! ```

mod mock_debrid;
mod mock_scraper;
mod scripted_ranker;

pub use mock_debrid::MockDebrid;
pub use mock_scraper::MockScraper;
pub use scripted_ranker::ScriptedTitleRanker;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::debrid::{CachedTorrent, DebridFile};
    use crate::media::{ItemDetails, ItemId, ItemState, MediaLibrary};
    use crate::ranking::{ParsedTitle, RankedTorrent, Stream};
    use crate::scrape::ScrapedTorrent;

    /// External id given to the show built by [`show_library`].
    pub const SHOW_IMDB_ID: &str = "tt0903747";

    /// External id given to the movie built by [`movie_library`].
    pub const MOVIE_IMDB_ID: &str = "tt0113277";

    /// Ids of the items built by [`show_library`].
    #[derive(Debug, Clone)]
    pub struct ShowIds {
        pub show: ItemId,
        /// One entry per requested season, in the order given.
        pub seasons: Vec<ItemId>,
        /// Episodes of each season, indexed like `seasons`.
        pub episodes: Vec<Vec<ItemId>>,
    }

    pub fn empty_library() -> MediaLibrary {
        MediaLibrary::new()
    }

    /// Midsummer of `year`.
    pub fn aired_in(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 7, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// A library holding one released movie titled "Movie", ready to scrape.
    pub fn movie_library(year: i32) -> (MediaLibrary, ItemId) {
        let mut library = empty_library();
        let movie = library.add_movie(
            ItemDetails::new("Movie")
                .with_imdb_id(MOVIE_IMDB_ID)
                .aired(aired_in(year))
                .with_state(ItemState::Content),
        );
        (library, movie)
    }

    /// A library holding one show titled "Show" with `(season, episode count)`
    /// seasons. Every item aired years ago and is in state `Content`.
    pub fn show_library(layout: &[(u32, u32)]) -> (MediaLibrary, ShowIds) {
        let mut library = empty_library();
        let show = library.add_show(
            ItemDetails::new("Show")
                .with_imdb_id(SHOW_IMDB_ID)
                .aired(aired_in(2008))
                .with_state(ItemState::Content),
        );

        let mut ids = ShowIds {
            show,
            seasons: Vec::new(),
            episodes: Vec::new(),
        };
        for (season_number, episode_count) in layout {
            let season = library
                .add_season(
                    show,
                    *season_number,
                    ItemDetails::new(format!("Season {}", season_number))
                        .aired(aired_in(2008))
                        .with_state(ItemState::Content),
                )
                .expect("fixture season");
            let episodes = (1..=*episode_count)
                .map(|number| {
                    library
                        .add_episode(
                            season,
                            number,
                            ItemDetails::new(format!("Episode {}", number))
                                .aired(aired_in(2008))
                                .with_state(ItemState::Content),
                        )
                        .expect("fixture episode")
                })
                .collect();
            ids.seasons.push(season);
            ids.episodes.push(episodes);
        }
        (library, ids)
    }

    fn parsed(raw: &str) -> ParsedTitle {
        ParsedTitle {
            raw_title: raw.to_string(),
            parsed_title: raw.to_string(),
            ..ParsedTitle::default()
        }
    }

    /// A movie release from `year`.
    pub fn movie(raw: &str, year: i32) -> ParsedTitle {
        ParsedTitle {
            year: Some(year),
            ..parsed(raw)
        }
    }

    /// A single episode `SxxEyy`.
    pub fn episode(raw: &str, season: u32, episode: u32) -> ParsedTitle {
        let mut title = parsed(raw);
        title.seasons.insert(season);
        title.episodes.insert(episode);
        title
    }

    /// An episode number without a season, as anime releases are named.
    pub fn bare_episode(raw: &str, episode: u32) -> ParsedTitle {
        let mut title = parsed(raw);
        title.episodes.insert(episode);
        title
    }

    /// A pack of whole seasons.
    pub fn season_pack(raw: &str, seasons: &[u32]) -> ParsedTitle {
        let mut title = parsed(raw);
        title.seasons.extend(seasons.iter().copied());
        title
    }

    /// A release claiming to be the complete series.
    pub fn complete(raw: &str) -> ParsedTitle {
        ParsedTitle {
            complete: true,
            ..parsed(raw)
        }
    }

    pub fn scraped(infohash: &str, title: &str) -> ScrapedTorrent {
        ScrapedTorrent::new(infohash, title)
    }

    /// An accepted, not blacklisted stream.
    pub fn stream(infohash: &str, rank: i64, data: ParsedTitle) -> Stream {
        Stream::from_ranked(RankedTorrent {
            infohash: infohash.to_string(),
            data,
            rank,
        })
    }

    /// A cached torrent with the given `(path, size)` files.
    pub fn cached_torrent(infohash: &str, files: &[(&str, u64)]) -> CachedTorrent {
        let files: Vec<DebridFile> = files
            .iter()
            .map(|(name, size)| DebridFile::new(*name, *size))
            .collect();
        CachedTorrent {
            infohash: infohash.to_lowercase(),
            name: format!("torrent-{}", infohash.to_lowercase()),
            size: files.iter().map(|f| f.size).sum(),
            files,
        }
    }
}
