//! Backend connection configuration.
//!
//! One base URL serves both the REST API (`/api/v1/...`) and the PostgREST
//! surface (`/rest/v1/...`). Override via environment variables or explicit
//! construction for staging and tests.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::core::{DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT};

/// Environment variable holding the backend base URL (required).
pub const ENV_API_URL: &str = "IDEABOARD_API_URL";

/// Environment variable holding the public anon API key (optional).
pub const ENV_ANON_KEY: &str = "IDEABOARD_ANON_KEY";

/// Environment variable overriding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "IDEABOARD_TIMEOUT_SECS";

/// Environment variable overriding the read retry count.
pub const ENV_MAX_RETRIES: &str = "IDEABOARD_MAX_RETRIES";

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A URL did not parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),

    /// A numeric setting did not parse.
    #[error("invalid value for {var}: {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Backend connection settings.
///
/// `Debug` redacts the anon key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL of the backend.
    pub base_url: Url,
    /// Public API key sent as the `apikey` header.
    pub anon_key: Option<Zeroizing<String>>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt, for reads only.
    pub max_retries: u32,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &self.anon_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl BackendConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            anon_key: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the anon API key.
    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(Zeroizing::new(key.into()));
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the read retry count.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `IDEABOARD_API_URL` (required)
    /// - `IDEABOARD_ANON_KEY` (optional)
    /// - `IDEABOARD_TIMEOUT_SECS` (default: 10)
    /// - `IDEABOARD_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup(ENV_API_URL).ok_or(ConfigError::Missing(ENV_API_URL))?;
        let mut config = Self::new(parse_url(ENV_API_URL, &raw_url)?);

        if let Some(key) = lookup(ENV_ANON_KEY).filter(|k| !k.trim().is_empty()) {
            config = config.anon_key(key);
        }
        if let Some(secs) = parse_number::<u64>(&lookup, ENV_TIMEOUT_SECS)? {
            config.timeout_secs = secs.max(1);
        }
        if let Some(retries) = parse_number::<u32>(&lookup, ENV_MAX_RETRIES)? {
            config.max_retries = retries;
        }
        Ok(config)
    }

    /// Configuration pointing at a local mock server.
    pub fn local(port: u16) -> Result<Self, ConfigError> {
        let url = parse_url("localhost", &format!("http://127.0.0.1:{port}"))?;
        Ok(Self::new(url).timeout(Duration::from_secs(5)))
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(
            var.to_string(),
            "URL cannot be a base".to_string(),
        ));
    }
    Ok(url)
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
