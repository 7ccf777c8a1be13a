//! Configuration types for blog-archive

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Number of posts requested per page; the feed API refuses anything larger.
pub const PAGE_SIZE: u32 = 20;

/// Feed API access settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, ending in `/` (default: "https://api.tumblr.com/v2/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Consumer key sent as the `api_key` query parameter
    #[serde(default)]
    pub api_key: Option<String>,

    /// User-Agent header for every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single API request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Shape of the credentials file holding the consumer key
#[derive(Deserialize)]
struct KeyFile {
    consumer_key: String,
}

impl ApiConfig {
    /// Read the consumer key from a JSON file of the form `{"consumer_key": "..."}`
    pub fn load_key_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "api.api_key",
                format!("failed to read key file {}: {}", path.display(), e),
            )
        })?;
        let key: KeyFile = serde_json::from_str(&content).map_err(|e| {
            Error::config(
                "api.api_key",
                format!("invalid key file {}: {}", path.display(), e),
            )
        })?;
        self.api_key = Some(key.consumer_key);
        Ok(())
    }
}

/// Where and how media assets are materialized
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Directory rendered pages are written to (default: "posts")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Asset directory, relative to `output_dir` (default: "images")
    #[serde(default = "default_asset_subdir")]
    pub asset_subdir: String,

    /// Number of download workers (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Write buffer size for streamed downloads in bytes (default: 16 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Timeout for a single asset download (default: 60 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            asset_subdir: default_asset_subdir(),
            workers: default_workers(),
            chunk_size: default_chunk_size(),
            download_timeout: default_download_timeout(),
        }
    }
}

impl AssetConfig {
    /// Directory downloaded files are written to
    pub fn asset_dir(&self) -> PathBuf {
        self.output_dir.join(&self.asset_subdir)
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./scrape.sqlite")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for an archive run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed API access
    #[serde(default)]
    pub api: ApiConfig,

    /// Asset download pool
    #[serde(default)]
    pub assets: AssetConfig,

    /// Record store
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.assets.workers == 0 {
            return Err(Error::config("assets.workers", "at least one worker is required"));
        }
        if self.assets.chunk_size == 0 {
            return Err(Error::config("assets.chunk_size", "chunk size must be non-zero"));
        }
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(Error::config(
                "api.base_url",
                format!("invalid base URL '{}': {}", self.api.base_url, e),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://api.tumblr.com/v2/".to_string()
}

fn default_user_agent() -> String {
    concat!("blog-archive/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("posts")
}

fn default_asset_subdir() -> String {
    "images".to_string()
}

fn default_workers() -> usize {
    5
}

fn default_chunk_size() -> usize {
    16 * 1024
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("scrape.sqlite")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_feed_and_pool_limits() {
        let config = Config::default();
        assert_eq!(PAGE_SIZE, 20);
        assert_eq!(config.assets.workers, 5);
        assert_eq!(config.assets.chunk_size, 16384);
        assert_eq!(config.assets.asset_dir(), PathBuf::from("posts").join("images"));
        assert!(config.api.base_url.ends_with('/'));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"assets": {"workers": 2}, "api": {"request_timeout": 5}}"#)
                .unwrap();
        assert_eq!(config.assets.workers, 2);
        assert_eq!(config.assets.asset_subdir, "images");
        assert_eq!(config.api.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("scrape.sqlite")
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.assets.workers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("assets.workers")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_base_url_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn key_file_populates_api_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret_key");
        std::fs::write(&path, r#"{"consumer_key": "abc123"}"#).unwrap();

        let mut api = ApiConfig::default();
        api.load_key_file(&path).unwrap();
        assert_eq!(api.api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn malformed_key_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret_key");
        std::fs::write(&path, "consumer_key=abc").unwrap();

        let mut api = ApiConfig::default();
        assert!(matches!(
            api.load_key_file(&path),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut original = Config::default();
        original.assets.workers = 3;
        std::fs::write(&path, serde_json::to_string(&original).unwrap()).unwrap();

        let loaded = Config::from_json_file(&path).unwrap();
        assert_eq!(loaded.assets.workers, 3);
        assert_eq!(loaded.api.request_timeout, original.api.request_timeout);
    }
}
