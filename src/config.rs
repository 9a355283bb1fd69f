//! Service configuration file support.
//!
//! Settings are read from a TOML file whose path comes from the
//! `HFPROP_CONFIG` environment variable (a `.env` file is honoured). Every
//! section and key is optional; anything missing takes its default, so an
//! absent file yields a fully working configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crate::ingest::kc2g::KC2G_STATIONS_URL;
use crate::ionosonde::StoreSettings;
use crate::logging::LogLevel;
use crate::model::ServiceError;

pub const CONFIG_ENV_VAR: &str = "HFPROP_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub ionosonde: IonosondeSettings,
    #[serde(default)]
    pub space_weather: SpaceWeatherSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonosondeSettings {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ionosonde_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: i64,
    #[serde(default = "default_max_coverage_km")]
    pub max_coverage_km: f64,
    #[serde(default = "default_direct_radius_km")]
    pub direct_radius_km: f64,
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceWeatherSettings {
    /// Directory the scraper jobs write into. Unset means fixed defaults.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Directory holding the background bitmaps and country mask.
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_console_timestamps")]
    pub console_timestamps: bool,
}

fn default_feed_url() -> String {
    KC2G_STATIONS_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_ionosonde_ttl_secs() -> i64 {
    600
}

fn default_freshness_hours() -> i64 {
    24
}

fn default_max_coverage_km() -> f64 {
    3000.0
}

fn default_direct_radius_km() -> f64 {
    50.0
}

fn default_max_neighbors() -> usize {
    5
}

fn default_cache_ttl_secs() -> i64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_console_timestamps() -> bool {
    true
}

impl Default for IonosondeSettings {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_secs: default_timeout_secs(),
            ttl_secs: default_ionosonde_ttl_secs(),
            freshness_hours: default_freshness_hours(),
            max_coverage_km: default_max_coverage_km(),
            direct_radius_km: default_direct_radius_km(),
            max_neighbors: default_max_neighbors(),
        }
    }
}

impl IonosondeSettings {
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            ttl: Duration::seconds(self.ttl_secs),
            freshness_window: Duration::hours(self.freshness_hours),
            max_coverage_km: self.max_coverage_km,
            direct_radius_km: self.direct_radius_km,
            max_neighbors: self.max_neighbors,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            assets_dir: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            console_timestamps: default_console_timestamps(),
        }
    }
}

impl ServiceConfig {
    /// Parses configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Io(format!("Failed to parse config file: {}", e)))
    }

    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ServiceError::Io(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads from `$HFPROP_CONFIG` after reading `.env`, or returns the
    /// defaults when the variable is unset.
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Configured log level, falling back to Info for unknown names.
    pub fn log_level(&self) -> LogLevel {
        self.logging.level.parse().unwrap_or(LogLevel::Info)
    }
}
