//! Mock scraper for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::scrape::{ScrapeError, ScrapeRequest, ScrapedTorrent, Scraper};

/// A request handler that produces results based on the request.
type RequestHandler =
    Box<dyn Fn(&ScrapeRequest) -> Result<Vec<ScrapedTorrent>, ScrapeError> + Send + Sync>;

/// Mock implementation of the Scraper trait.
///
/// Returns configured results (or the output of a handler), records every
/// request and can fail the next call.
///
/// # Example
///
/// ```rust,ignore
/// use cachehound_core::testing::{MockScraper, fixtures};
///
/// let scraper = MockScraper::new();
/// scraper.set_results(vec![fixtures::scraped("abc", "Movie.2019.1080p")]).await;
///
/// let results = scraper.scrape(&request).await?;
/// assert_eq!(results.len(), 1);
/// assert_eq!(scraper.recorded_requests().await.len(), 1);
/// ```
pub struct MockScraper {
    results: Arc<RwLock<Vec<ScrapedTorrent>>>,
    requests: Arc<RwLock<Vec<ScrapeRequest>>>,
    /// If set, the next scrape will fail with this error.
    next_error: Arc<RwLock<Option<ScrapeError>>>,
    handler: Arc<RwLock<Option<RequestHandler>>>,
}

impl std::fmt::Debug for MockScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScraper")
            .field("results", &"<results>")
            .field("requests", &"<requests>")
            .field("next_error", &"<next_error>")
            .field("handler", &"<handler>")
            .finish()
    }
}

impl Default for MockScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScraper {
    /// Create a new mock scraper returning no results.
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(Vec::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the results returned for every request.
    pub async fn set_results(&self, results: Vec<ScrapedTorrent>) {
        *self.results.write().await = results;
    }

    /// Produce results per request. Takes precedence over `set_results`.
    pub async fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&ScrapeRequest) -> Result<Vec<ScrapedTorrent>, ScrapeError> + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Make the next scrape fail.
    pub async fn set_next_error(&self, error: ScrapeError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn recorded_requests(&self) -> Vec<ScrapeRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scrape(&self, request: &ScrapeRequest) -> Result<Vec<ScrapedTorrent>, ScrapeError> {
        self.requests.write().await.push(request.clone());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(handler) = self.handler.read().await.as_ref() {
            return handler(request);
        }

        Ok(self.results.read().await.clone())
    }
}
