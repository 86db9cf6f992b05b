//! Configuration Module
//!
//! Startup configuration for the caching behaviors and the in-memory store.
//! Both values are built once and then shared read-only.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable holding the default sliding expiration in days.
pub const SLIDING_EXPIRATION_ENV: &str = "CACHE_SLIDING_EXPIRATION_DAYS";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// == Cache Settings ==
/// Process-wide caching settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheSettings {
    /// Sliding expiration used when a request does not carry its own, in days
    #[serde(rename = "SlidingExpiration")]
    pub sliding_expiration_days: u64,
}

#[derive(Deserialize)]
struct SettingsDocument {
    #[serde(rename = "CacheSettings")]
    cache_settings: Option<CacheSettings>,
}

impl CacheSettings {
    /// Creates settings with the given default expiration in days.
    pub fn new(sliding_expiration_days: u64) -> Result<Self, ConfigError> {
        if sliding_expiration_days == 0 {
            return Err(ConfigError::Invalid {
                name: SLIDING_EXPIRATION_ENV.to_string(),
                value: "0".to_string(),
                reason: "sliding expiration must be at least one day".to_string(),
            });
        }
        Ok(Self {
            sliding_expiration_days,
        })
    }

    /// Loads settings from the `CACHE_SLIDING_EXPIRATION_DAYS` environment variable.
    ///
    /// There is no default: an absent or unparsable value is a startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(SLIDING_EXPIRATION_ENV)
            .ok_or_else(|| ConfigError::Missing(SLIDING_EXPIRATION_ENV.to_string()))?;

        let days = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
            name: SLIDING_EXPIRATION_ENV.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })?;

        Self::new(days)
    }

    /// Loads settings from the `CacheSettings` section of a JSON document.
    ///
    /// ```
    /// use request_cache::CacheSettings;
    ///
    /// let settings = CacheSettings::from_json(r#"{"CacheSettings":{"SlidingExpiration":2}}"#).unwrap();
    /// assert_eq!(settings.sliding_expiration_days, 2);
    /// ```
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let parsed: SettingsDocument = serde_json::from_str(document)?;
        let section = parsed
            .cache_settings
            .ok_or_else(|| ConfigError::Missing("CacheSettings".to_string()))?;
        Self::new(section.sliding_expiration_days)
    }

    /// Default sliding expiration as a duration.
    pub fn sliding_expiration_default(&self) -> Duration {
        Duration::from_secs(self.sliding_expiration_days.saturating_mul(SECONDS_PER_DAY))
    }
}

// == Store Config ==
/// Tuning for the in-memory cache store.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries the store can hold
    pub max_entries: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl StoreConfig {
    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            max_entries: lookup("CACHE_MAX_ENTRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            cleanup_interval: lookup("CACHE_CLEANUP_INTERVAL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cleanup_interval: 60,
        }
    }
}
