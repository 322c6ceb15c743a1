use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachehound_core::{
    load_config, metrics, validate_config, AvailabilityResolver, CandidateRanker, DebridBackend,
    DebridProvider, DownloadPass, FileMatcher, FileMatcherConfig, HeuristicTitleRanker,
    MediaLibrary, Orchestrator, RankOptions, SanitizedConfig, ScrapePass, ScrapeRateLimiter,
    Scraper, SqliteStreamStore, StreamStore, TitleRanker, TorBoxDebrid, TorrentioScraper,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let once = std::env::args().nth(1).as_deref() == Some("once");

    // Determine config path
    let config_path = std::env::var("CACHEHOUND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!(version = VERSION, "Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    debug!(config = %sanitized, "Configuration loaded");
    info!("Database path: {:?}", config.database.path);
    info!("Library path: {:?}", config.library.path);

    let registry = Registry::new();
    metrics::register_metrics(&registry).context("Failed to register metrics")?;

    let store: Arc<dyn StreamStore> = Arc::new(
        SqliteStreamStore::new(&config.database.path).context("Failed to open stream store")?,
    );
    info!("Stream store initialized");

    let library = if config.library.path.exists() {
        let library = MediaLibrary::load(&config.library.path)
            .with_context(|| format!("Failed to load library from {:?}", config.library.path))?;
        info!(items = library.len(), "Media library loaded");
        library
    } else {
        warn!("No library snapshot at {:?}, starting empty", config.library.path);
        MediaLibrary::new()
    };

    let title_ranker: Arc<dyn TitleRanker> =
        Arc::new(HeuristicTitleRanker::new().context("Failed to build title ranker")?);

    let scraper: Arc<dyn Scraper> = Arc::new(
        TorrentioScraper::new(config.torrentio.clone()).context("Failed to create scraper")?,
    );
    info!("Using scraper {} at {}", scraper.name(), config.torrentio.url);

    let debrid: Arc<dyn DebridProvider> = match &config.debrid {
        Some(debrid_config) => match debrid_config.backend {
            DebridBackend::Torbox => {
                let Some(torbox_config) = &debrid_config.torbox else {
                    bail!("TorBox backend selected but no torbox config provided");
                };
                info!("Initializing TorBox debrid at {}", torbox_config.url);
                Arc::new(
                    TorBoxDebrid::new(torbox_config.clone())
                        .context("Failed to create TorBox client")?,
                )
            }
        },
        None => bail!("No debrid provider configured"),
    };

    let scrape = ScrapePass::new(
        scraper,
        ScrapeRateLimiter::new(&config.scraping.rate_limit),
        CandidateRanker::new(
            Arc::clone(&title_ranker),
            RankOptions::from(&config.scraping),
        ),
        config.scraping.cooldown(),
    );
    let matcher = FileMatcher::new(
        title_ranker,
        FileMatcherConfig::from(&config.downloader),
    );
    let download = DownloadPass::new(AvailabilityResolver::new(
        debrid,
        matcher,
        config.downloader.batch_size,
    ));

    let mut orchestrator = Orchestrator::new(
        scrape,
        download,
        store,
        library,
        config.orchestrator.clone(),
    )
    .with_snapshot(config.library.path.clone());

    if once {
        let summary = orchestrator.run_once().await?;
        info!(
            summary = %serde_json::to_string(&summary).unwrap_or_default(),
            "Single cycle complete"
        );
    } else {
        orchestrator.run_until(shutdown_signal()).await?;
    }

    log_metrics(&registry);
    info!("Shutdown complete");
    Ok(())
}

fn log_metrics(registry: &Registry) {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return;
    }
    debug!("Final metrics:\n{}", String::from_utf8_lossy(&buffer));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
