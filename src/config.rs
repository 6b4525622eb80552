//! Environment-sourced service settings.
//!
//! All settings can be configured via environment variables:
//! - `AWN_API_KEY`, `AWN_APPLICATION_KEY`: Ambient Weather credentials
//! - `AWN_MAC_ADDRESS`: device (MAC) identifier of the station
//! - `AWN_API_BASE`: API base URL (default: https://rt.ambientweather.net/v1)
//! - `COLLECTION_INTERVAL_SECONDS`: seconds between collections (default: 60)
//! - `DAILY_RETENTION_DAYS`: days raw readings are kept (default: 7)
//! - `DATABASE_PATH`: SQLite database file (default: ./weather.db)

use crate::error::{Result, StationError};
use crate::station::client::{ApiCredentials, DEFAULT_API_BASE};
use crate::station::collector::CollectorConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between collection ticks
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default retention window for raw readings, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Default SQLite database location
pub const DEFAULT_DATABASE_PATH: &str = "./weather.db";

/// Service settings loaded from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub application_key: String,
    pub mac_address: String,
    pub api_base: String,
    pub collection_interval_secs: u64,
    pub retention_days: u32,
    pub database_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            application_key: String::new(),
            mac_address: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            collection_interval_secs: DEFAULT_INTERVAL_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let text = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            api_key: text("AWN_API_KEY").unwrap_or_default(),
            application_key: text("AWN_APPLICATION_KEY").unwrap_or_default(),
            mac_address: text("AWN_MAC_ADDRESS").unwrap_or_default(),
            api_base: text("AWN_API_BASE").unwrap_or(defaults.api_base),
            collection_interval_secs: parse_positive(
                "COLLECTION_INTERVAL_SECONDS",
                text("COLLECTION_INTERVAL_SECONDS"),
                defaults.collection_interval_secs,
            )?,
            retention_days: parse_positive(
                "DAILY_RETENTION_DAYS",
                text("DAILY_RETENTION_DAYS"),
                defaults.retention_days,
            )?,
            database_path: text("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
        })
    }

    /// Upstream credentials, when all of them are configured.
    pub fn credentials(&self) -> Option<ApiCredentials> {
        if self.api_key.is_empty() || self.application_key.is_empty() || self.mac_address.is_empty()
        {
            return None;
        }

        Some(ApiCredentials {
            api_key: self.api_key.clone(),
            application_key: self.application_key.clone(),
            mac_address: self.mac_address.clone(),
        })
    }

    /// Collection loop settings; `None` means the loop must not start.
    pub fn collector_config(&self) -> Option<CollectorConfig> {
        self.credentials().map(|credentials| {
            CollectorConfig::new(
                credentials.mac_address,
                Duration::from_secs(self.collection_interval_secs),
                self.retention_days,
            )
        })
    }
}

fn parse_positive<T>(name: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let Some(value) = value else {
        return Ok(default);
    };

    match value.parse::<T>() {
        Ok(parsed) if parsed >= T::from(1) => Ok(parsed),
        _ => Err(StationError::config_error(format!(
            "{} must be a positive integer, got '{}'",
            name, value
        ))),
    }
}
