//! The scrape pass: eligible items → scraper → ranker → stream store.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::types::{PassError, ScrapeSummary};
use crate::media::{ItemId, ItemState, MediaKind, MediaLibrary};
use crate::metrics;
use crate::ranking::CandidateRanker;
use crate::scrape::{
    cooldown_elapsed, should_scrape, ScrapeError, ScrapeRateLimiter, ScrapeRequest, Scraper,
};
use crate::store::StreamStore;

/// What happened to one scraped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Streams,
    NoStreams,
    Aborted,
}

/// Scrapes every eligible item of the library, sequentially.
pub struct ScrapePass {
    scraper: Arc<dyn Scraper>,
    limiter: ScrapeRateLimiter,
    ranker: CandidateRanker,
    cooldown: Duration,
}

impl ScrapePass {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        limiter: ScrapeRateLimiter,
        ranker: CandidateRanker,
        cooldown: Duration,
    ) -> Self {
        Self {
            scraper,
            limiter,
            ranker,
            cooldown,
        }
    }

    pub async fn run(
        &mut self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
    ) -> Result<ScrapeSummary, PassError> {
        self.run_at(library, store, Utc::now()).await
    }

    /// Run the pass as if the current time were `now`.
    ///
    /// Movies are scraped directly. Shows descend: the show-level pack query
    /// once its cooldown has elapsed, then each eligible season, then the
    /// eligible episodes of seasons that are not `Scraped`.
    pub async fn run_at(
        &mut self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
        now: DateTime<Utc>,
    ) -> Result<ScrapeSummary, PassError> {
        let started = Instant::now();
        let mut summary = ScrapeSummary::default();

        for id in library.root_ids() {
            if !should_scrape(library, id, now, self.cooldown) {
                continue;
            }
            let is_show = matches!(library.item(id)?.kind, MediaKind::Show { .. });
            let outcome = if is_show {
                self.scrape_show(library, store, id, now, &mut summary).await?
            } else {
                self.scrape_item(library, store, id, now, &mut summary).await?
            };
            if outcome == ItemOutcome::Aborted {
                break;
            }
        }

        metrics::PASS_DURATION
            .with_label_values(&["scrape"])
            .observe(started.elapsed().as_secs_f64());
        if let Some(reason) = &summary.aborted {
            metrics::PASSES_ABORTED.with_label_values(&["scrape"]).inc();
            warn!(
                requests = summary.requests,
                reason = %reason,
                "Scrape pass aborted, resuming next cycle"
            );
        } else {
            info!(
                requests = summary.requests,
                items_with_streams = summary.items_with_streams,
                streams_new = summary.streams_new,
                errors = summary.errors,
                "Scrape pass complete"
            );
        }
        Ok(summary)
    }

    async fn scrape_show(
        &mut self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
        show: ItemId,
        now: DateTime<Utc>,
        summary: &mut ScrapeSummary,
    ) -> Result<ItemOutcome, PassError> {
        if cooldown_elapsed(library.item(show)?, now, self.cooldown)
            && self.scrape_item(library, store, show, now, summary).await? == ItemOutcome::Aborted
        {
            return Ok(ItemOutcome::Aborted);
        }

        for season in library.seasons(show)?.to_vec() {
            if should_scrape(library, season, now, self.cooldown)
                && self.scrape_item(library, store, season, now, summary).await?
                    == ItemOutcome::Aborted
            {
                return Ok(ItemOutcome::Aborted);
            }
            if library.item(season)?.state == ItemState::Scraped {
                continue;
            }

            for episode in library.episodes(season)?.to_vec() {
                if should_scrape(library, episode, now, self.cooldown)
                    && self.scrape_item(library, store, episode, now, summary).await?
                        == ItemOutcome::Aborted
                {
                    return Ok(ItemOutcome::Aborted);
                }
            }
        }
        Ok(ItemOutcome::NoStreams)
    }

    async fn scrape_item(
        &mut self,
        library: &mut MediaLibrary,
        store: &dyn StreamStore,
        id: ItemId,
        now: DateTime<Utc>,
        summary: &mut ScrapeSummary,
    ) -> Result<ItemOutcome, PassError> {
        let Some(request) = ScrapeRequest::for_item(library, id)? else {
            debug!(item = %library.log_string(id), "No external id, skipping scrape");
            summary.items_without_id += 1;
            return Ok(ItemOutcome::NoStreams);
        };

        if let Err(e) = self.limiter.acquire().await {
            return Ok(abort(summary, &request, e));
        }

        summary.requests += 1;
        let results = match self.scraper.scrape(&request).await {
            Ok(results) => results,
            Err(e) if e.aborts_pass() => return Ok(abort(summary, &request, e)),
            Err(e) => {
                metrics::SCRAPE_CALLS.with_label_values(&[e.kind()]).inc();
                summary.errors += 1;
                if matches!(e, ScrapeError::ApiError(_)) {
                    library.mark_scraped(id, now)?;
                }
                warn!(item = %request.log_string, scraper = %self.scraper.name(), error = %e, "Scrape failed");
                return Ok(ItemOutcome::NoStreams);
            }
        };

        library.mark_scraped(id, now)?;
        let report = self.ranker.rank(library, id, &results)?;
        if report.streams.is_empty() {
            metrics::SCRAPE_CALLS.with_label_values(&["empty"]).inc();
            summary.items_without_streams += 1;
            debug!(
                item = %request.log_string,
                results = results.len(),
                "No acceptable streams"
            );
            return Ok(ItemOutcome::NoStreams);
        }

        metrics::SCRAPE_CALLS.with_label_values(&["ok"]).inc();
        let new_streams = store.save_streams(id, &report.streams)?;
        summary.items_with_streams += 1;
        summary.streams_accepted += report.streams.len();
        summary.streams_new += new_streams;

        if !matches!(library.item(id)?.kind, MediaKind::Show { .. }) {
            library.set_state(id, ItemState::Scraped)?;
        }
        info!(
            item = %request.log_string,
            accepted = report.streams.len(),
            new = new_streams,
            processed = report.processed,
            "Scraped streams"
        );
        Ok(ItemOutcome::Streams)
    }
}

fn abort(summary: &mut ScrapeSummary, request: &ScrapeRequest, error: ScrapeError) -> ItemOutcome {
    metrics::SCRAPE_CALLS.with_label_values(&[error.kind()]).inc();
    warn!(item = %request.log_string, error = %error, "Aborting scrape pass");
    summary.aborted = Some(error.to_string());
    ItemOutcome::Aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::media::ItemDetails;
    use crate::ranking::RankOptions;
    use crate::scrape::{ScrapeTarget, TokenBucket};
    use crate::store::SqliteStreamStore;
    use crate::testing::{fixtures, MockScraper, ScriptedTitleRanker};

    fn pass(scraper: Arc<MockScraper>, ranker: ScriptedTitleRanker) -> ScrapePass {
        let limiter = ScrapeRateLimiter::from_buckets(
            TokenBucket::new(100, tokio::time::Duration::from_secs(60)),
            TokenBucket::new(100, tokio::time::Duration::from_secs(1)),
        );
        ScrapePass::new(
            scraper,
            limiter,
            CandidateRanker::new(Arc::new(ranker), RankOptions::default()),
            crate::scrape::DEFAULT_SCRAPE_COOLDOWN,
        )
    }

    #[tokio::test]
    async fn test_movie_with_streams_becomes_scraped() {
        let (mut library, movie) = fixtures::movie_library(2019);
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        scraper
            .set_results(vec![
                fixtures::scraped("AAA", "Movie.2019.1080p"),
                fixtures::scraped("bbb", "Movie.2019.720p"),
            ])
            .await;
        let ranker = ScriptedTitleRanker::new()
            .with_parsed("Movie.2019.1080p", fixtures::movie("Movie.2019.1080p", 2019), 100)
            .with_parsed("Movie.2019.720p", fixtures::movie("Movie.2019.720p", 2019), 60);

        let now = Utc::now();
        let summary = pass(scraper.clone(), ranker)
            .run_at(&mut library, &store, now)
            .await
            .unwrap();

        assert_eq!(summary.requests, 1);
        assert_eq!(summary.streams_new, 2);
        let item = library.get(movie).unwrap();
        assert_eq!(item.state, ItemState::Scraped);
        assert_eq!(item.scraped_at, Some(now));
        let streams = store.load_streams(movie).unwrap();
        assert_eq!(streams[0].infohash, "aaa");
    }

    #[tokio::test]
    async fn test_no_streams_keeps_content_and_sets_cooldown() {
        let (mut library, movie) = fixtures::movie_library(2019);
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        let mut pass = pass(scraper.clone(), ScriptedTitleRanker::new());

        let now = Utc::now();
        let summary = pass.run_at(&mut library, &store, now).await.unwrap();
        assert_eq!(summary.items_without_streams, 1);
        assert_eq!(library.get(movie).unwrap().state, ItemState::Content);

        // Inside the cooldown window nothing is scraped.
        let summary = pass
            .run_at(&mut library, &store, now + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(summary.requests, 0);
        assert_eq!(scraper.recorded_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_pass() {
        let mut library = fixtures::empty_library();
        for title in ["First", "Second"] {
            library.add_movie(
                ItemDetails::new(title)
                    .with_imdb_id("tt1")
                    .aired(fixtures::aired_in(2000))
                    .with_state(ItemState::Content),
            );
        }
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        scraper.set_next_error(ScrapeError::Timeout).await;

        let summary = pass(scraper.clone(), ScriptedTitleRanker::new())
            .run(&mut library, &store)
            .await
            .unwrap();

        assert!(summary.is_aborted());
        assert_eq!(scraper.recorded_requests().await.len(), 1);
        assert!(library.root_ids().iter().all(|id| library.get(*id).unwrap().scraped_at.is_none()));
    }

    #[tokio::test]
    async fn test_api_error_sets_cooldown_and_continues() {
        let mut library = fixtures::empty_library();
        let ids: Vec<_> = ["First", "Second"]
            .iter()
            .map(|title| {
                library.add_movie(
                    ItemDetails::new(*title)
                        .with_imdb_id("tt1")
                        .aired(fixtures::aired_in(2000))
                        .with_state(ItemState::Content),
                )
            })
            .collect();
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        scraper
            .set_next_error(ScrapeError::ApiError("HTTP 500".into()))
            .await;

        let summary = pass(scraper.clone(), ScriptedTitleRanker::new())
            .run(&mut library, &store)
            .await
            .unwrap();

        assert!(!summary.is_aborted());
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.requests, 2);
        assert!(library.get(ids[0]).unwrap().scraped_at.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_budget_aborts_pass() {
        let mut library = fixtures::empty_library();
        for title in ["First", "Second", "Third"] {
            library.add_movie(
                ItemDetails::new(title)
                    .with_imdb_id("tt1")
                    .aired(fixtures::aired_in(2000))
                    .with_state(ItemState::Content),
            );
        }
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        let limiter = ScrapeRateLimiter::new(&RateLimitConfig {
            max_calls: 2,
            period_secs: 300,
            pace_calls: 10,
            pace_period_secs: 1,
        });
        let mut pass = ScrapePass::new(
            scraper.clone(),
            limiter,
            CandidateRanker::new(Arc::new(ScriptedTitleRanker::new()), RankOptions::default()),
            crate::scrape::DEFAULT_SCRAPE_COOLDOWN,
        );

        let summary = pass.run(&mut library, &store).await.unwrap();
        assert_eq!(summary.requests, 2);
        assert!(summary.aborted.as_deref().unwrap().contains("rate limit"));
    }

    #[tokio::test]
    async fn test_show_descends_into_seasons_and_episodes() {
        let (mut library, ids) = fixtures::show_library(&[(1, 2), (2, 2)]);
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());
        scraper
            .set_handler(|request| {
                Ok(match request.target {
                    ScrapeTarget::Season { season: 1 } => {
                        vec![fixtures::scraped("s1", "Show.S01.1080p")]
                    }
                    _ => Vec::new(),
                })
            })
            .await;
        let ranker = ScriptedTitleRanker::new()
            .with_parsed("Show.S01.1080p", fixtures::season_pack("Show.S01.1080p", &[1]), 10);

        let summary = pass(scraper.clone(), ranker)
            .run(&mut library, &store)
            .await
            .unwrap();

        let targets: Vec<ScrapeTarget> = scraper
            .recorded_requests()
            .await
            .iter()
            .map(|r| r.target)
            .collect();
        // Season 1 got a pack, so only season 2's episodes are queried.
        assert_eq!(
            targets,
            vec![
                ScrapeTarget::Show,
                ScrapeTarget::Season { season: 1 },
                ScrapeTarget::Season { season: 2 },
                ScrapeTarget::Episode { season: 2, episode: 1 },
                ScrapeTarget::Episode { season: 2, episode: 2 },
            ]
        );
        assert_eq!(summary.items_with_streams, 1);
        assert_eq!(library.get(ids.seasons[0]).unwrap().state, ItemState::Scraped);
        assert_eq!(library.get(ids.show).unwrap().state, ItemState::Content);
    }

    #[tokio::test]
    async fn test_show_level_query_respects_cooldown() {
        let (mut library, ids) = fixtures::show_library(&[(1, 1)]);
        let now = Utc::now();
        library.mark_scraped(ids.show, now - Duration::minutes(1)).unwrap();
        let store = SqliteStreamStore::in_memory().unwrap();
        let scraper = Arc::new(MockScraper::new());

        pass(scraper.clone(), ScriptedTitleRanker::new())
            .run_at(&mut library, &store, now)
            .await
            .unwrap();

        let requests = scraper.recorded_requests().await;
        assert!(requests.iter().all(|r| r.target != ScrapeTarget::Show));
        assert_eq!(requests.len(), 2);
    }
}
