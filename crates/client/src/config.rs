//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `NUTRISCAN_API_URL` - Base URL of the service API (default: `http://localhost:8000/api`)
//! - `NUTRISCAN_DATA_DIR` - Directory for the persisted session and offline cache
//!   (default: the platform data directory + `nutriscan`)
//! - `NUTRISCAN_CACHE_VERSION` - Offline cache version tag (default: `nutriscan-v1`)
//! - `NUTRISCAN_CACHE_ALLOW` - Comma-separated cacheable paths, relative to the API
//!   base (default: `/health`). Entries ending in `/*` match by prefix.
//! - `NUTRISCAN_CACHE_PERSIST` - Keep cached responses on disk (default: true)
//! - `NUTRISCAN_CONNECT_TIMEOUT_SECS` - Connect timeout (default: 5)
//! - `NUTRISCAN_REQUEST_TIMEOUT_SECS` - Whole-request timeout (default: 90)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cache::CacheVersion;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_CACHE_VERSION: &str = "nutriscan-v1";
const DEFAULT_CACHE_ALLOW: &str = "/health";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
// Analysis waits on a vision model; the service itself allows it 60s.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// NutriScan client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is appended to
    pub api_url: Url,
    /// Directory holding the session file and the on-disk cache
    pub data_dir: PathBuf,
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// Time allowed for a whole request, body included
    pub request_timeout: Duration,
    /// Offline cache configuration
    pub cache: CacheConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Offline cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Active version tag; entries under any other tag are purged
    pub version: CacheVersion,
    /// Cacheable paths relative to the API base
    pub allow: Vec<String>,
    /// Keep entries on disk under `data_dir`
    pub persist: bool,
    /// Maximum in-memory entries
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: CacheVersion::default(),
            allow: parse_list(DEFAULT_CACHE_ALLOW),
            persist: true,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the endpoint and data
    /// directory.
    #[must_use]
    pub fn new(api_url: Url, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url,
            data_dir: data_dir.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache: CacheConfig::default(),
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if no
    /// data directory can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_url = Url::parse(&get_or("NUTRISCAN_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("NUTRISCAN_API_URL".to_string(), e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "NUTRISCAN_API_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let data_dir = match lookup("NUTRISCAN_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("nutriscan"))
                .ok_or_else(|| ConfigError::MissingEnvVar("NUTRISCAN_DATA_DIR".to_string()))?,
        };

        let version = get_or("NUTRISCAN_CACHE_VERSION", DEFAULT_CACHE_VERSION)
            .parse::<CacheVersion>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("NUTRISCAN_CACHE_VERSION".to_string(), e.to_string())
            })?;
        let persist = parse_bool("NUTRISCAN_CACHE_PERSIST", &get_or("NUTRISCAN_CACHE_PERSIST", "true"))?;

        Ok(Self {
            api_url,
            data_dir,
            connect_timeout: parse_secs(
                "NUTRISCAN_CONNECT_TIMEOUT_SECS",
                lookup("NUTRISCAN_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            request_timeout: parse_secs(
                "NUTRISCAN_REQUEST_TIMEOUT_SECS",
                lookup("NUTRISCAN_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            cache: CacheConfig {
                version,
                allow: parse_list(&get_or("NUTRISCAN_CACHE_ALLOW", DEFAULT_CACHE_ALLOW)),
                persist,
                capacity: DEFAULT_CACHE_CAPACITY,
            },
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
        })
    }

    /// Path of the persisted session document.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    /// Root directory of the on-disk offline cache.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("offline-cache")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
