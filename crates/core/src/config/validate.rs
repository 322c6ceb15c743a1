use super::{
    types::{Config, DebridBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Downloader batch size is not 0
/// - Rate limit budgets and periods are not 0
/// - Scheduler intervals are not 0
/// - The selected debrid backend has an API key
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.downloader.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "downloader.batch_size cannot be 0".to_string(),
        ));
    }

    let rate_limit = &config.scraping.rate_limit;
    if rate_limit.max_calls == 0 || rate_limit.pace_calls == 0 {
        return Err(ConfigError::ValidationError(
            "scraping.rate_limit call budgets cannot be 0".to_string(),
        ));
    }
    if rate_limit.period_secs == 0 || rate_limit.pace_period_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scraping.rate_limit periods cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.scrape_interval_secs == 0
        || config.orchestrator.download_interval_secs == 0
    {
        return Err(ConfigError::ValidationError(
            "orchestrator intervals cannot be 0".to_string(),
        ));
    }

    if let Some(debrid) = &config.debrid {
        match debrid.backend {
            DebridBackend::Torbox => {
                let configured = debrid
                    .torbox
                    .as_ref()
                    .is_some_and(|t| !t.api_key.trim().is_empty());
                if !configured {
                    return Err(ConfigError::ValidationError(
                        "debrid.torbox.api_key is required when backend = \"torbox\"".to_string(),
                    ));
                }
            }
        }
    }

    Ok(())
}
