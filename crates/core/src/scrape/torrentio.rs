//! Torrentio scraper implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::TorrentioConfig;

use super::{ScrapeError, ScrapeRequest, ScrapedTorrent, Scraper};

/// Separator between the release name and the uploader/seeders line.
const TITLE_DETAILS_SEPARATOR: &str = "\n👤";

/// Scraper backed by a Torrentio-compatible Stremio addon.
pub struct TorrentioScraper {
    client: Client,
    config: TorrentioConfig,
}

impl TorrentioScraper {
    pub fn new(config: TorrentioConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ScrapeError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn build_url(&self, request: &ScrapeRequest) -> String {
        let base = self.config.url.trim_end_matches('/');
        let filter = self.config.filter.trim_matches('/');
        let prefix = if filter.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, filter)
        };
        format!(
            "{}/stream/{}/{}{}.json",
            prefix,
            request.scrape_type(),
            urlencoding::encode(&request.imdb_id),
            request.identifier().unwrap_or_default()
        )
    }
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    streams: Vec<TorrentioStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TorrentioStream {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    info_hash: Option<String>,
}

/// Keep the first `max_results` streams that carry both a hash and a title.
fn collect_streams(response: StreamsResponse, max_results: usize) -> Vec<ScrapedTorrent> {
    response
        .streams
        .into_iter()
        .filter_map(|stream| {
            let infohash = stream.info_hash.filter(|h| !h.is_empty())?;
            let title = stream.title?;
            let name = title
                .split(TITLE_DETAILS_SEPARATOR)
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            Some(ScrapedTorrent::new(infohash, name))
        })
        .take(max_results)
        .collect()
}

#[async_trait]
impl Scraper for TorrentioScraper {
    fn name(&self) -> &str {
        "torrentio"
    }

    async fn scrape(&self, request: &ScrapeRequest) -> Result<Vec<ScrapedTorrent>, ScrapeError> {
        let url = self.build_url(request);
        debug!(item = %request.log_string, url = %url, "Scraping Torrentio");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout
            } else if e.is_connect() {
                ScrapeError::ConnectionFailed(e.to_string())
            } else {
                ScrapeError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(ScrapeError::RateLimitExceeded { retry_after_ms });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: StreamsResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::ApiError(format!("Failed to parse response: {}", e)))?;

        let torrents = collect_streams(parsed, self.config.max_results);
        debug!(
            item = %request.log_string,
            results = torrents.len(),
            "Torrentio scrape complete"
        );
        Ok(torrents)
    }
}
