use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable prefix for overrides, e.g. `CACHEHOUND_DEBRID__TORBOX__API_KEY`
pub const ENV_PREFIX: &str = "CACHEHOUND_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[scraping]
cooldown_secs = 60

[scraping.rate_limit]
max_calls = 10
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.scraping.cooldown_secs, 60);
        assert_eq!(config.scraping.rate_limit.max_calls, 10);
        assert_eq!(config.scraping.rate_limit.pace_calls, 1);
    }

    #[test]
    fn test_load_config_from_str_bad_backend() {
        let toml = r#"
[debrid]
backend = "realdebrid"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[torrentio]
url = "http://localhost:7000"
filter = ""

[database]
path = "/data/streams.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.torrentio.url, "http://localhost:7000");
        assert!(config.torrentio.filter.is_empty());
        assert_eq!(config.database.path.to_str().unwrap(), "/data/streams.db");
    }
}
