pub mod config;
pub mod debrid;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod ranking;
pub mod scrape;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DebridBackend,
    SanitizedConfig,
};
pub use debrid::{
    AvailabilityResolver, DebridError, DebridProvider, FileMatcher, FileMatcherConfig,
    ResolveError, Selection, TorBoxDebrid,
};
pub use media::{ItemDetails, ItemId, ItemState, LibraryError, MediaItem, MediaKind, MediaLibrary};
pub use orchestrator::{DownloadPass, Orchestrator, PassError, ScrapePass};
pub use ranking::{CandidateRanker, HeuristicTitleRanker, RankOptions, Stream, TitleRanker};
pub use scrape::{should_scrape, ScrapeError, ScrapeRateLimiter, Scraper, TorrentioScraper};
pub use store::{SqliteStreamStore, StoreError, StreamStore};
