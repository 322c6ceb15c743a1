//! Interval scheduler running both passes.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::download_pass::DownloadPass;
use super::scrape_pass::ScrapePass;
use super::types::{CycleSummary, DownloadSummary, PassError, ScrapeSummary};
use crate::config::OrchestratorConfig;
use crate::media::MediaLibrary;
use crate::store::StreamStore;

/// Owns the library and runs the scrape and download passes on their
/// intervals, in a single task.
pub struct Orchestrator {
    scrape: ScrapePass,
    download: DownloadPass,
    store: Arc<dyn StreamStore>,
    library: MediaLibrary,
    /// Where the library snapshot is written after each pass.
    snapshot_path: Option<PathBuf>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        scrape: ScrapePass,
        download: DownloadPass,
        store: Arc<dyn StreamStore>,
        library: MediaLibrary,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            scrape,
            download,
            store,
            library,
            snapshot_path: None,
            config,
        }
    }

    /// Save the library to `path` after every pass.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    pub async fn scrape_once(&mut self) -> Result<ScrapeSummary, PassError> {
        let summary = self
            .scrape
            .run(&mut self.library, self.store.as_ref())
            .await?;
        self.save_snapshot()?;
        Ok(summary)
    }

    pub async fn download_once(&mut self) -> Result<DownloadSummary, PassError> {
        let summary = self
            .download
            .run(&mut self.library, self.store.as_ref())
            .await?;
        self.save_snapshot()?;
        Ok(summary)
    }

    /// One scrape pass followed by one download pass.
    pub async fn run_once(&mut self) -> Result<CycleSummary, PassError> {
        let scrape = self.scrape_once().await?;
        let download = self.download_once().await?;
        Ok(CycleSummary { scrape, download })
    }

    /// Run both passes on their intervals until `shutdown` resolves.
    ///
    /// Pass errors are logged and the loop keeps going. The library is saved
    /// once more before returning.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), PassError>
    where
        F: Future<Output = ()>,
    {
        let mut scrape_tick =
            tokio::time::interval(Duration::from_secs(self.config.scrape_interval_secs.max(1)));
        let mut download_tick = tokio::time::interval(Duration::from_secs(
            self.config.download_interval_secs.max(1),
        ));
        scrape_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        download_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            scrape_interval_secs = self.config.scrape_interval_secs,
            download_interval_secs = self.config.download_interval_secs,
            items = self.library.len(),
            "Orchestrator started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Orchestrator received shutdown signal");
                    break;
                }
                _ = scrape_tick.tick() => {
                    if let Err(e) = self.scrape_once().await {
                        error!(error = %e, "Scrape pass failed");
                    }
                }
                _ = download_tick.tick() => {
                    if let Err(e) = self.download_once().await {
                        error!(error = %e, "Download pass failed");
                    }
                }
            }
        }

        self.save_snapshot()?;
        info!("Orchestrator stopped");
        Ok(())
    }

    fn save_snapshot(&self) -> Result<(), PassError> {
        if let Some(path) = &self.snapshot_path {
            self.library.save(path)?;
        }
        Ok(())
    }
}
