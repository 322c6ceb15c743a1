//! Download pass integration tests.
//!
//! Scrape and download passes run back to back against mock providers, with
//! the heuristic title ranker parsing both release names and file names:
//! - Blacklisting of uncached streams and recovery on a later scrape
//! - Show packs covering every released episode
//! - A full orchestrator cycle persisting the library snapshot

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use cachehound_core::{
    config::{OrchestratorConfig, RateLimitConfig},
    debrid::{AvailabilityResolver, FileMatcher, FileMatcherConfig, DEFAULT_BATCH_SIZE},
    media::{ItemDetails, ItemId, ItemState, MediaLibrary},
    ranking::{CandidateRanker, HeuristicTitleRanker, RankOptions},
    scrape::{ScrapeRateLimiter, ScrapeTarget, DEFAULT_SCRAPE_COOLDOWN},
    store::{SqliteStreamStore, StreamStore},
    testing::{fixtures, MockDebrid, MockScraper},
    DownloadPass, Orchestrator, ScrapePass,
};

const GB: u64 = 1_000_000_000;

/// Test helper holding both passes and their mocks.
struct TestHarness {
    scrape: ScrapePass,
    download: DownloadPass,
    scraper: Arc<MockScraper>,
    debrid: Arc<MockDebrid>,
    store: Arc<SqliteStreamStore>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteStreamStore::new(&temp_dir.path().join("streams.db"))
                .expect("Failed to create stream store"),
        );
        let ranker = Arc::new(HeuristicTitleRanker::new().expect("Failed to build ranker"));
        let scraper = Arc::new(MockScraper::new());
        let debrid = Arc::new(MockDebrid::new());

        let scrape = ScrapePass::new(
            scraper.clone(),
            ScrapeRateLimiter::new(&RateLimitConfig {
                max_calls: 100,
                period_secs: 60,
                pace_calls: 100,
                pace_period_secs: 1,
            }),
            CandidateRanker::new(ranker.clone(), RankOptions::default()),
            DEFAULT_SCRAPE_COOLDOWN,
        );
        let download = DownloadPass::new(AvailabilityResolver::new(
            debrid.clone(),
            FileMatcher::new(ranker, FileMatcherConfig::default()),
            DEFAULT_BATCH_SIZE,
        ));

        Self {
            scrape,
            download,
            scraper,
            debrid,
            store,
            temp_dir,
        }
    }

    async fn cycle(&mut self, library: &mut MediaLibrary, now: DateTime<Utc>) {
        self.scrape
            .run_at(library, self.store.as_ref(), now)
            .await
            .expect("Scrape pass failed");
        self.download
            .run_at(library, self.store.as_ref(), now)
            .await
            .expect("Download pass failed");
    }
}

fn heat_library() -> (MediaLibrary, ItemId) {
    let mut library = MediaLibrary::new();
    let movie = library.add_movie(
        ItemDetails::new("Heat")
            .with_imdb_id("tt0113277")
            .aired(fixtures::aired_in(1995))
            .with_state(ItemState::Content),
    );
    (library, movie)
}

#[tokio::test]
async fn test_uncached_streams_exhaust_item_until_new_candidate_appears() {
    let mut harness = TestHarness::new();
    let (mut library, movie) = heat_library();
    harness
        .scraper
        .set_results(vec![
            fixtures::scraped("aaa", "Heat.1995.1080p.BluRay.x264-GRP"),
            fixtures::scraped("bbb", "Heat.1995.720p.WEBRip"),
        ])
        .await;
    let start = Utc::now();

    harness.cycle(&mut library, start).await;

    let item = library.get(movie).unwrap();
    assert_eq!(item.state, ItemState::Content);
    assert!(item.active_stream.is_none());
    let streams = harness.store.load_streams(movie).unwrap();
    assert!(streams.iter().all(|s| s.blacklisted));
    assert_eq!(harness.store.blacklisted_count(movie).unwrap(), 2);

    // Within the cooldown nothing is scraped or resolved.
    harness
        .cycle(&mut library, start + Duration::minutes(10))
        .await;
    assert_eq!(harness.scraper.recorded_requests().await.len(), 1);

    // A later scrape finds a new release the provider has cached. The
    // blacklisted ones stay skipped even though one of them is now cached.
    harness
        .debrid
        .add_cached(fixtures::cached_torrent(
            "bbb",
            &[("Heat.1995.720p.WEBRip.mkv", 2 * GB)],
        ))
        .await;
    harness
        .debrid
        .add_cached(fixtures::cached_torrent(
            "ggg",
            &[
                ("Heat.1995.1080p.WEB-DL/Sample.mkv", 50_000_000),
                ("Heat.1995.1080p.WEB-DL/Heat.1995.1080p.WEB-DL.mkv", 4 * GB),
            ],
        ))
        .await;
    harness
        .scraper
        .set_results(vec![
            fixtures::scraped("aaa", "Heat.1995.1080p.BluRay.x264-GRP"),
            fixtures::scraped("bbb", "Heat.1995.720p.WEBRip"),
            fixtures::scraped("ggg", "Heat.1995.1080p.WEB-DL"),
        ])
        .await;

    let later = start + DEFAULT_SCRAPE_COOLDOWN + Duration::minutes(1);
    harness.cycle(&mut library, later).await;

    let item = library.get(movie).unwrap();
    assert_eq!(item.state, ItemState::Downloaded);
    let active = item.active_stream.as_ref().unwrap();
    assert_eq!(active.infohash, "ggg");
    assert_eq!(
        item.file.as_deref(),
        Some("Heat.1995.1080p.WEB-DL/Heat.1995.1080p.WEB-DL.mkv")
    );
    assert_eq!(harness.debrid.added().await, vec!["ggg".to_string()]);
}

#[tokio::test]
async fn test_show_pack_covers_released_episodes() {
    let mut harness = TestHarness::new();
    let now = Utc::now();
    let mut library = MediaLibrary::new();
    let show = library.add_show(
        ItemDetails::new("Severance")
            .with_imdb_id("tt11280740")
            .aired(fixtures::aired_in(2022))
            .with_state(ItemState::Content),
    );
    let mut seasons = Vec::new();
    let mut episodes = Vec::new();
    for season_number in [1, 2] {
        let season = library
            .add_season(
                show,
                season_number,
                ItemDetails::new(format!("Season {}", season_number))
                    .aired(fixtures::aired_in(2022))
                    .with_state(ItemState::Content),
            )
            .unwrap();
        for episode_number in [1, 2] {
            let aired = if season_number == 2 && episode_number == 2 {
                now + Duration::days(7)
            } else {
                fixtures::aired_in(2022)
            };
            episodes.push(
                library
                    .add_episode(
                        season,
                        episode_number,
                        ItemDetails::new(format!("Episode {}", episode_number))
                            .aired(aired)
                            .with_state(ItemState::Content),
                    )
                    .unwrap(),
            );
        }
        seasons.push(season);
    }

    harness
        .scraper
        .set_handler(|request| {
            Ok(match request.target {
                ScrapeTarget::Show => vec![fixtures::scraped("pk", "Severance.S01-S02.1080p")],
                _ => Vec::new(),
            })
        })
        .await;
    harness
        .debrid
        .add_cached(fixtures::cached_torrent(
            "pk",
            &[
                ("Severance.S01-S02.1080p/Severance.S01E01.1080p.mkv", GB),
                ("Severance.S01-S02.1080p/Severance.S01E02.1080p.mkv", GB),
                ("Severance.S01-S02.1080p/Severance.S02E01.1080p.mkv", GB),
                ("Severance.S01-S02.1080p/Severance.S01E01.1080p.nfo", 2_000),
            ],
        ))
        .await;

    harness.cycle(&mut library, now).await;

    assert_eq!(harness.debrid.added().await, vec!["pk".to_string()]);
    assert_eq!(library.get(show).unwrap().state, ItemState::Downloaded);
    assert_eq!(library.get(seasons[0]).unwrap().state, ItemState::Downloaded);
    assert_eq!(
        library.get(seasons[1]).unwrap().state,
        ItemState::PartiallyCompleted
    );

    for (index, expected) in [
        (0, Some("Severance.S01-S02.1080p/Severance.S01E01.1080p.mkv")),
        (1, Some("Severance.S01-S02.1080p/Severance.S01E02.1080p.mkv")),
        (2, Some("Severance.S01-S02.1080p/Severance.S02E01.1080p.mkv")),
        (3, None),
    ] {
        let episode = library.get(episodes[index]).unwrap();
        assert_eq!(episode.file.as_deref(), expected, "episode {}", index);
    }
    assert_eq!(library.get(episodes[3]).unwrap().state, ItemState::Content);
}

#[tokio::test]
async fn test_orchestrator_cycle_persists_snapshot() {
    let harness = TestHarness::new();
    let snapshot = harness.temp_dir.path().join("library.json");
    let (library, movie) = heat_library();
    harness
        .scraper
        .set_results(vec![fixtures::scraped(
            "AAA",
            "Heat.1995.1080p.BluRay.x264-GRP",
        )])
        .await;
    harness
        .debrid
        .add_cached(fixtures::cached_torrent(
            "aaa",
            &[("Heat.1995.1080p.BluRay.x264-GRP.mkv", 8 * GB)],
        ))
        .await;

    let store: Arc<dyn StreamStore> = harness.store.clone();
    let mut orchestrator = Orchestrator::new(
        harness.scrape,
        harness.download,
        store,
        library,
        OrchestratorConfig::default(),
    )
    .with_snapshot(&snapshot);

    let summary = orchestrator.run_once().await.unwrap();
    assert_eq!(summary.scrape.requests, 1);
    assert_eq!(summary.download.selected, 1);

    let reloaded = MediaLibrary::load(&snapshot).unwrap();
    let item = reloaded.get(movie).unwrap();
    assert_eq!(item.state, ItemState::Downloaded);
    assert_eq!(item.active_stream.as_ref().unwrap().infohash, "aaa");
    assert!(item.scraped_at.is_some());
}
