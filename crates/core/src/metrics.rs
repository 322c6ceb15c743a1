//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scraping (scraper calls, ranking outcomes)
//! - Availability resolution (debrid queries, blacklisting, selections)
//! - Orchestrator passes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Scraping
// =============================================================================

/// Scraper calls total by result.
pub static SCRAPE_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachehound_scrape_calls_total", "Total scraper calls"),
        &["result"], // "ok", "empty", "rate_limited", "timeout", "connection_failed", "api_error", "internal"
    )
    .unwrap()
});

/// Ranked candidates by outcome.
pub static CANDIDATES_RANKED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cachehound_candidates_ranked_total",
            "Scraped candidates by ranking outcome",
        ),
        &["outcome"], // "accepted", "duplicate", "malformed", "rejected", "wrong_country", "inadmissible"
    )
    .unwrap()
});

// =============================================================================
// Availability resolution
// =============================================================================

/// Debrid cache lookups.
pub static AVAILABILITY_QUERIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cachehound_availability_queries_total",
        "Total debrid availability queries",
    )
    .unwrap()
});

/// Streams newly blacklisted.
pub static STREAMS_BLACKLISTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cachehound_streams_blacklisted_total",
        "Total streams blacklisted",
    )
    .unwrap()
});

/// Selections made.
pub static SELECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cachehound_selections_total",
        "Total torrents selected and added to the debrid account",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator
// =============================================================================

/// Pass duration in seconds.
pub static PASS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("cachehound_pass_duration_seconds", "Duration of a pass")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["pass"], // "scrape", "download"
    )
    .unwrap()
});

/// Passes cut short by a rate limit or transport error.
pub static PASSES_ABORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachehound_passes_aborted_total", "Total aborted passes"),
        &["pass"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scraping
        Box::new(SCRAPE_CALLS.clone()),
        Box::new(CANDIDATES_RANKED.clone()),
        // Availability
        Box::new(AVAILABILITY_QUERIES.clone()),
        Box::new(STREAMS_BLACKLISTED.clone()),
        Box::new(SELECTIONS.clone()),
        // Orchestrator
        Box::new(PASS_DURATION.clone()),
        Box::new(PASSES_ABORTED.clone()),
    ]
}

/// Register all core metrics in `registry`.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    for collector in all_metrics() {
        registry.register(collector)?;
    }
    Ok(())
}
