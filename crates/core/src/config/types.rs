use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub torrentio: TorrentioConfig,
    #[serde(default)]
    pub debrid: Option<DebridConfig>,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Scraping and ranking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapingConfig {
    /// Minimum time between two scrapes of the same item
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Also accept titles matching an alias of the item
    #[serde(default = "default_true")]
    pub enable_aliases: bool,
    /// Log every candidate decision at debug level
    #[serde(default)]
    pub parse_debug: bool,
    /// Reject cam/telesync/screener releases
    #[serde(default = "default_true")]
    pub remove_trash: bool,
    /// How many seasons a show pack may miss and still be admitted
    #[serde(default = "default_show_season_tolerance")]
    pub show_season_tolerance: usize,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl ScrapingConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs.min(i64::MAX as u64) as i64)
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            enable_aliases: true,
            parse_debug: false,
            remove_trash: true,
            show_season_tolerance: default_show_season_tolerance(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    30 * 60
}

fn default_true() -> bool {
    true
}

fn default_show_season_tolerance() -> usize {
    1
}

/// Scraper call budget: a long window plus a short pacing window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_pace_calls")]
    pub pace_calls: u32,
    #[serde(default = "default_pace_period_secs")]
    pub pace_period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            period_secs: default_period_secs(),
            pace_calls: default_pace_calls(),
            pace_period_secs: default_pace_period_secs(),
        }
    }
}

fn default_max_calls() -> u32 {
    140
}

fn default_period_secs() -> u64 {
    300
}

fn default_pace_calls() -> u32 {
    1
}

fn default_pace_period_secs() -> u64 {
    1
}

/// Torrentio addon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentioConfig {
    #[serde(default = "default_torrentio_url")]
    pub url: String,
    /// Addon filter path segment, may be empty
    #[serde(default = "default_torrentio_filter")]
    pub filter: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for TorrentioConfig {
    fn default() -> Self {
        Self {
            url: default_torrentio_url(),
            filter: default_torrentio_filter(),
            timeout_secs: default_timeout(),
            max_results: default_max_results(),
        }
    }
}

fn default_torrentio_url() -> String {
    "https://torrentio.strem.fun".to_string()
}

fn default_torrentio_filter() -> String {
    "sort=qualitysize%7Cqualityfilter=480p,scr,cam".to_string()
}

fn default_max_results() -> usize {
    20
}

fn default_timeout() -> u32 {
    30
}

/// Debrid configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridConfig {
    pub backend: DebridBackend,
    /// TorBox-specific configuration (required when backend = "torbox")
    #[serde(default)]
    pub torbox: Option<TorboxConfig>,
}

/// Available debrid backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebridBackend {
    Torbox,
}

/// TorBox debrid backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorboxConfig {
    #[serde(default = "default_torbox_url")]
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_torbox_url() -> String {
    "https://api.torbox.app/v1/api".to_string()
}

/// Inclusive file size window in megabytes. A negative `max` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SizeBounds {
    #[serde(default)]
    pub min: i64,
    #[serde(default = "default_unbounded")]
    pub max: i64,
}

impl SizeBounds {
    pub fn contains(&self, bytes: u64) -> bool {
        let mb = bytes as f64 / 1_000_000.0;
        if mb < self.min as f64 {
            return false;
        }
        self.max < 0 || mb <= self.max as f64
    }
}

fn default_unbounded() -> i64 {
    -1
}

/// Availability resolution and file matching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// Streams checked per availability query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Files smaller than this many bytes are ignored
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    #[serde(default = "default_movie_filesize")]
    pub movie_filesize_mb: SizeBounds,
    #[serde(default = "default_episode_filesize")]
    pub episode_filesize_mb: SizeBounds,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_file_size: default_min_file_size(),
            video_extensions: default_video_extensions(),
            movie_filesize_mb: default_movie_filesize(),
            episode_filesize_mb: default_episode_filesize(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_min_file_size() -> u64 {
    10_000
}

fn default_video_extensions() -> Vec<String> {
    vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()]
}

fn default_movie_filesize() -> SizeBounds {
    SizeBounds { min: 700, max: -1 }
}

fn default_episode_filesize() -> SizeBounds {
    SizeBounds { min: 100, max: -1 }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cachehound.db")
}

/// Media library snapshot location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_path")]
    pub path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
        }
    }
}

fn default_library_path() -> PathBuf {
    PathBuf::from("library.json")
}

/// Pass scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,
    #[serde(default = "default_download_interval")]
    pub download_interval_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scrape_interval_secs: default_scrape_interval(),
            download_interval_secs: default_download_interval(),
        }
    }
}

fn default_scrape_interval() -> u64 {
    300
}

fn default_download_interval() -> u64 {
    60
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub scraping: ScrapingConfig,
    pub torrentio: TorrentioConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debrid: Option<SanitizedDebridConfig>,
    pub downloader: DownloaderConfig,
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Sanitized debrid config (API key redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDebridConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torbox: Option<SanitizedTorboxConfig>,
}

/// Sanitized TorBox config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTorboxConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            scraping: config.scraping.clone(),
            torrentio: config.torrentio.clone(),
            debrid: config.debrid.as_ref().map(|d| SanitizedDebridConfig {
                backend: match d.backend {
                    DebridBackend::Torbox => "torbox".to_string(),
                },
                torbox: d.torbox.as_ref().map(|t| SanitizedTorboxConfig {
                    url: t.url.clone(),
                    api_key_configured: !t.api_key.is_empty(),
                    timeout_secs: t.timeout_secs,
                }),
            }),
            downloader: config.downloader.clone(),
            database: config.database.clone(),
            library: config.library.clone(),
            orchestrator: config.orchestrator.clone(),
        }
    }
}
