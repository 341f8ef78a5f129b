//! Configuration management for secnews.
//!
//! Configuration is read from `~/.config/secnews/config.toml` (or the path given
//! with `--config`). If the file doesn't exist, a default configuration with
//! comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::aggregator::DEFAULT_WORKERS;
use crate::fetcher::http_fetcher::DEFAULT_TIMEOUT_SECS;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub scheduler: SchedulerSettings,
    pub fetcher: FetcherSettings,
    pub store: StoreSettings,
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Directory with the dashboard's static files, served at `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Refresh period like "1h", "30m", "1d" or raw seconds
    pub interval: String,
    pub run_on_start: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: "1h".to_string(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherSettings {
    pub timeout_secs: u64,
    pub workers: usize,
    pub user_agent: Option<String>,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Database file; defaults to `<data_dir>/secnews/secnews.db`
    pub path: Option<PathBuf>,
}

/// A `[[sources]]` table exactly as written in the file.
///
/// Every field is optional here so that a missing field is reported by the
/// source registry with the entry's position instead of a generic TOML error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    pub name: Option<String>,
    pub tag: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub scraper_module: Option<String>,
    pub filter_keyword: Option<String>,
}

impl SourceEntry {
    pub fn rss(name: &str, tag: &str, url: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            tag: Some(tag.to_string()),
            kind: Some("rss".to_string()),
            url: Some(url.to_string()),
            scraper_module: None,
            filter_keyword: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing sections use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            tracing::info!(path = %config_path.display(), "Created default configuration");
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content, &config_path)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/secnews/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("secnews").join("config.toml"))
    }

    /// Resolve the database path, creating its parent directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let path = match &self.store.path {
            Some(p) => p.clone(),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("secnews")
                .join("secnews.db"),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        Ok(path)
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# secnews configuration

[server]
bind = "127.0.0.1:8000"
# Directory with the dashboard's static files, served at "/"
# static_dir = "static"

[scheduler]
# Refresh period: "1h", "30m", "1d", "90s" or raw seconds.
# Measured from the start of the previous refresh.
interval = "1h"
run_on_start = true

[fetcher]
timeout_secs = 15
# Number of sources fetched at the same time
workers = 8

[store]
# path = "/var/lib/secnews/secnews.db"

# Each source needs name, tag, type ("rss" or "scraper") and url.
# Scraper sources also need scraper_module.
# filter_keyword keeps only items whose title or summary mention it.

[[sources]]
name = "보안뉴스"
tag = "KR"
type = "rss"
url = "https://www.boannews.com/media/news_rss.xml"

[[sources]]
name = "The Hacker News"
tag = "EN"
type = "rss"
url = "https://feeds.feedburner.com/TheHackersNews"

[[sources]]
name = "BleepingComputer"
tag = "EN"
type = "rss"
url = "https://www.bleepingcomputer.com/feed/"
"##
        .to_string()
    }
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Source #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Source '{name}' has unknown type '{kind}'")]
    UnknownType { name: String, kind: String },

    #[error("Source '{name}' has an invalid url: {reason}")]
    InvalidUrl { name: String, reason: String },

    #[error("Source '{name}' is declared more than once")]
    DuplicateSource { name: String },

    #[error("Scraper source '{name}' does not name a scraper_module")]
    MissingScraperModule { name: String },

    #[error("Source '{name}' refers to unknown scraper module '{module}'")]
    UnknownScraper { name: String, module: String },

    #[error("Invalid interval '{0}'. Use format like '1h', '30m', '1d'")]
    InvalidInterval(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.scheduler.interval, "1h");
        assert_eq!(config.fetcher.timeout_secs, 15);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].tag.as_deref(), Some("KR"));
        assert_eq!(config.sources[1].kind.as_deref(), Some("rss"));
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[fetcher]
workers = 2

[[sources]]
name = "CISA"
type = "rss"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.fetcher.workers, 2);
        assert_eq!(config.fetcher.timeout_secs, 15);
        assert!(config.scheduler.run_on_start);
        // Missing fields are left for the registry to reject
        assert_eq!(config.sources[0].tag, None);
        assert_eq!(config.sources[0].url, None);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert!(config.sources.is_empty());
        assert_eq!(config.scheduler.interval, "1h");
    }

    #[test]
    fn test_malformed_config_reports_path() {
        let err = Config::from_toml_str("[[sources]\nname = ", Path::new("/tmp/bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("/tmp/bad.toml"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_database_path_uses_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("news.db");
        let config = Config {
            store: StoreSettings {
                path: Some(db.clone()),
            },
            ..Default::default()
        };

        assert_eq!(config.database_path().unwrap(), db);
        assert!(db.parent().unwrap().exists());
    }
}
