//! Scrape pass integration tests.
//!
//! These tests run the scrape pass against a mock scraper with the real
//! heuristic title ranker and a file-backed stream store:
//! - Candidate outcomes (duplicates, trash, wrong year, dates, other titles)
//! - Show descent into seasons and episodes
//! - Rate limit exhaustion ending the pass
//! - Blacklist flags surviving a re-scrape

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use cachehound_core::{
    config::RateLimitConfig,
    media::{ItemDetails, ItemId, ItemState, MediaLibrary},
    ranking::{CandidateRanker, HeuristicTitleRanker, RankOptions},
    scrape::{ScrapeRateLimiter, ScrapeTarget, DEFAULT_SCRAPE_COOLDOWN},
    store::{SqliteStreamStore, StreamStore},
    testing::{fixtures, MockScraper},
    ScrapePass,
};

/// Test helper wiring a scrape pass to mocks.
struct TestHarness {
    pass: ScrapePass,
    scraper: Arc<MockScraper>,
    store: SqliteStreamStore,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            max_calls: 100,
            period_secs: 60,
            pace_calls: 100,
            pace_period_secs: 1,
        })
    }

    fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteStreamStore::new(&temp_dir.path().join("streams.db"))
            .expect("Failed to create stream store");
        let scraper = Arc::new(MockScraper::new());
        let ranker = HeuristicTitleRanker::new().expect("Failed to build ranker");
        let pass = ScrapePass::new(
            scraper.clone(),
            ScrapeRateLimiter::new(&rate_limit),
            CandidateRanker::new(Arc::new(ranker), RankOptions::default()),
            DEFAULT_SCRAPE_COOLDOWN,
        );
        Self {
            pass,
            scraper,
            store,
            _temp_dir: temp_dir,
        }
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
async fn test_movie_candidates_are_filtered_and_ranked() {
    let mut harness = TestHarness::new();
    let (mut library, movie) = heat_library();
    harness
        .scraper
        .set_results(vec![
            fixtures::scraped("bbb", "Heat.1995.720p.WEBRip"),
            fixtures::scraped("AAA", "Heat.1995.1080p.BluRay.x264-GRP"),
            fixtures::scraped("aaa", "Heat 1995 2160p Remux HEVC"),
            fixtures::scraped("ccc", "Heat.1995.CAM"),
            fixtures::scraped("ddd", "Heat.1986.1080p"),
            fixtures::scraped("eee", "Heat.2023-05-14.1080p"),
            fixtures::scraped("fff", "Collateral.2004.1080p"),
        ])
        .await;

    let summary = harness
        .pass
        .run(&mut library, &harness.store)
        .await
        .unwrap();

    assert_eq!(summary.requests, 1);
    assert_eq!(summary.streams_accepted, 2);
    assert_eq!(library.get(movie).unwrap().state, ItemState::Scraped);

    let streams = harness.store.load_streams(movie).unwrap();
    let hashes: Vec<&str> = streams.iter().map(|s| s.infohash.as_str()).collect();
    assert_eq!(hashes, vec!["aaa", "bbb"]);
    assert_eq!(streams[0].raw_title, "Heat.1995.1080p.BluRay.x264-GRP");
    assert!(streams[0].rank > streams[1].rank);
    assert_eq!(streams[0].parsed.year, Some(1995));

    // Scraped items are not scraped again.
    let summary = harness
        .pass
        .run(&mut library, &harness.store)
        .await
        .unwrap();
    assert_eq!(summary.requests, 0);
}

#[tokio::test]
async fn test_show_scrape_descends_through_seasons() {
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
                ScrapeTarget::Show => {
                    vec![fixtures::scraped("pk", "Severance.S01-S02.1080p.WEB-DL")]
                }
                ScrapeTarget::Season { season: 1 } => {
                    vec![fixtures::scraped("s1", "Severance.S01.1080p.WEB-DL")]
                }
                ScrapeTarget::Episode {
                    season: 2,
                    episode: 1,
                } => vec![fixtures::scraped("e21", "Severance.S02E01.1080p")],
                _ => Vec::new(),
            })
        })
        .await;

    let summary = harness
        .pass
        .run_at(&mut library, &harness.store, now)
        .await
        .unwrap();

    let targets: Vec<ScrapeTarget> = harness
        .scraper
        .recorded_requests()
        .await
        .iter()
        .map(|r| r.target)
        .collect();
    assert_eq!(
        targets,
        vec![
            ScrapeTarget::Show,
            ScrapeTarget::Season { season: 1 },
            ScrapeTarget::Season { season: 2 },
            ScrapeTarget::Episode {
                season: 2,
                episode: 1
            },
        ]
    );
    assert_eq!(summary.items_with_streams, 3);

    assert_eq!(library.get(show).unwrap().state, ItemState::Content);
    assert_eq!(harness.store.count_streams(show).unwrap(), 1);
    assert_eq!(library.get(seasons[0]).unwrap().state, ItemState::Scraped);
    assert_eq!(library.get(seasons[1]).unwrap().state, ItemState::Content);
    assert_eq!(library.get(episodes[2]).unwrap().state, ItemState::Scraped);
    assert_eq!(library.get(episodes[3]).unwrap().state, ItemState::Content);
}

#[tokio::test]
async fn test_rate_limit_ends_pass_and_next_pass_resumes() {
    let mut harness = TestHarness::with_rate_limit(RateLimitConfig {
        max_calls: 1,
        period_secs: 3600,
        pace_calls: 10,
        pace_period_secs: 1,
    });
    let mut library = MediaLibrary::new();
    let first = library.add_movie(
        ItemDetails::new("Heat")
            .with_imdb_id("tt0113277")
            .aired(fixtures::aired_in(1995))
            .with_state(ItemState::Content),
    );
    let second = library.add_movie(
        ItemDetails::new("Ronin")
            .with_imdb_id("tt0122690")
            .aired(fixtures::aired_in(1998))
            .with_state(ItemState::Content),
    );

    let summary = harness
        .pass
        .run(&mut library, &harness.store)
        .await
        .unwrap();

    assert!(summary.is_aborted());
    assert_eq!(harness.scraper.recorded_requests().await.len(), 1);
    assert!(library.get(first).unwrap().scraped_at.is_some());
    assert!(library.get(second).unwrap().scraped_at.is_none());
}

#[tokio::test]
async fn test_blacklist_survives_rescrape() {
    let mut harness = TestHarness::new();
    let (mut library, movie) = heat_library();
    harness
        .scraper
        .set_results(vec![fixtures::scraped("aaa", "Heat.1995.1080p.BluRay")])
        .await;
    let now = Utc::now();

    harness
        .pass
        .run_at(&mut library, &harness.store, now)
        .await
        .unwrap();
    assert!(harness.store.blacklist(movie, "aaa").unwrap());
    library.set_state(movie, ItemState::Content).unwrap();

    let later = now + DEFAULT_SCRAPE_COOLDOWN + Duration::seconds(1);
    let summary = harness
        .pass
        .run_at(&mut library, &harness.store, later)
        .await
        .unwrap();

    assert_eq!(summary.streams_new, 0);
    let streams = harness.store.load_streams(movie).unwrap();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].blacklisted);
}
