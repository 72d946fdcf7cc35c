//! Sync configuration.
//!
//! # Responsibility
//! - Hold every tunable of the sync engine with defaults matching the
//!   production client.
//! - Resolve overrides from `WISDOME_*` environment variables.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - `max_attempts`, `batch_size` and `page_size` are always >= 1.

use crate::db::default_db_path;
use crate::remote::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FOLDER_NAME: &str = "Wisdome Notes";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_DOWNLOAD_BATCH_SIZE: usize = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

pub const ENV_FOLDER_NAME: &str = "WISDOME_FOLDER_NAME";
pub const ENV_API_BASE_URL: &str = "WISDOME_DRIVE_API_URL";
pub const ENV_UPLOAD_BASE_URL: &str = "WISDOME_DRIVE_UPLOAD_URL";
pub const ENV_MAX_ATTEMPTS: &str = "WISDOME_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "WISDOME_RETRY_BASE_MS";
pub const ENV_BATCH_SIZE: &str = "WISDOME_BATCH_SIZE";
pub const ENV_PAGE_SIZE: &str = "WISDOME_PAGE_SIZE";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "WISDOME_REQUEST_TIMEOUT_SECS";
pub const ENV_DB_PATH: &str = "WISDOME_DB_PATH";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, value: u64 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got `{value}`")
            }
            Self::OutOfRange { key, value } => write!(f, "{key} value {value} is out of range"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Name of the top-level remote folder holding note documents.
    pub folder_name: String,
    pub api_base_url: String,
    pub upload_base_url: String,
    /// Total attempts per remote call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per retry.
    pub retry_base_delay: Duration,
    /// Concurrent downloads per reconciliation batch.
    pub download_batch_size: usize,
    pub page_size: u32,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
    /// SQLite file backing the local note cache. Defaults to the per-user
    /// data directory.
    pub db_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_BASE_DELAY,
            download_batch_size: DEFAULT_DOWNLOAD_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: None,
            db_path: default_db_path(),
        }
    }
}

impl SyncConfig {
    /// Builds a configuration from process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let number = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match value(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
                None => Ok(None),
            }
        };

        let mut config = Self::default();
        if let Some(folder_name) = value(ENV_FOLDER_NAME) {
            config.folder_name = folder_name;
        }
        if let Some(url) = value(ENV_API_BASE_URL) {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = value(ENV_UPLOAD_BASE_URL) {
            config.upload_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(attempts) = number(ENV_MAX_ATTEMPTS)? {
            config.max_attempts = bounded(ENV_MAX_ATTEMPTS, attempts, 1, 10)? as u32;
        }
        if let Some(millis) = number(ENV_RETRY_BASE_MS)? {
            config.retry_base_delay = Duration::from_millis(millis);
        }
        if let Some(batch) = number(ENV_BATCH_SIZE)? {
            config.download_batch_size = bounded(ENV_BATCH_SIZE, batch, 1, 64)? as usize;
        }
        if let Some(page) = number(ENV_PAGE_SIZE)? {
            config.page_size = bounded(ENV_PAGE_SIZE, page, 1, u64::from(MAX_PAGE_SIZE))? as u32;
        }
        if let Some(secs) = number(ENV_REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(path) = value(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_base_delay)
    }
}

fn bounded(key: &'static str, value: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig, DEFAULT_FOLDER_NAME};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_production_client() {
        let config = SyncConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.folder_name, DEFAULT_FOLDER_NAME);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.download_batch_size, 5);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.request_timeout, None);
        assert!(!config.db_path.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn db_path_override_wins() {
        let config =
            SyncConfig::from_lookup(lookup(&[("WISDOME_DB_PATH", "/var/lib/wisdome/notes.db")]))
                .unwrap();
        assert_eq!(config.db_path, std::path::PathBuf::from("/var/lib/wisdome/notes.db"));
    }

    #[test]
    fn applies_trimmed_overrides_and_ignores_blanks() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("WISDOME_FOLDER_NAME", " Team Notes "),
            ("WISDOME_DRIVE_API_URL", "http://localhost:9000/"),
            ("WISDOME_RETRY_BASE_MS", "25"),
            ("WISDOME_REQUEST_TIMEOUT_SECS", "30"),
            ("WISDOME_BATCH_SIZE", "   "),
        ]))
        .unwrap();
        assert_eq!(config.folder_name, "Team Notes");
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.retry_base_delay, Duration::from_millis(25));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.download_batch_size, 5);
    }

    #[test]
    fn rejects_invalid_numbers() {
        let err = SyncConfig::from_lookup(lookup(&[("WISDOME_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = SyncConfig::from_lookup(lookup(&[("WISDOME_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config =
            SyncConfig::from_lookup(lookup(&[("WISDOME_REQUEST_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.request_timeout, None);
    }
}
