//! Configuration management for growthrecorder.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "growthrecorder";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "measurements.db";

/// Shown in place of secrets when configuration is printed.
pub const REDACTED: &str = "***";

/// Number of data fields a telemetry channel exposes.
const MAX_CHANNEL_FIELDS: u8 = 8;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GROWTHRECORDER_`, sections split by `__`)
/// 2. TOML config file at `~/.config/growthrecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local store configuration.
    pub storage: StorageConfig,
    /// Telemetry reading source configuration.
    pub telemetry: TelemetryConfig,
    /// Remote table configuration.
    pub sink: SinkConfig,
    /// QR rendering configuration.
    pub qr: QrConfig,
    /// Identity form rules.
    pub identity: IdentityConfig,
}

/// Local store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/growthrecorder/measurements.db`
    pub database_path: Option<PathBuf>,
    /// Key the measurement collection is stored under.
    pub key: String,
}

/// Telemetry channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the telemetry host.
    pub base_url: String,
    /// Channel the scale and stadiometer publish to.
    pub channel_id: u64,
    /// Which channel field carries which reading.
    pub fields: FieldMap,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Mapping from readings to telemetry field indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    /// Field carrying the weight in kilograms.
    pub weight: u8,
    /// Field carrying the standing height in centimetres (age one year and up).
    pub height: u8,
    /// Field carrying the recumbent length in centimetres (under one year).
    pub infant_height: u8,
}

/// Remote table configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Mirror saved records to the remote table.
    pub enabled: bool,
    /// Base URL of the hosted backend. The sink is inactive without one.
    pub url: Option<String>,
    /// API key sent with every insert.
    pub api_key: Option<String>,
    /// Table receiving the rows.
    pub table_name: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Error correction level used for QR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// Recovers about 7% of the symbol.
    L,
    /// Recovers about 15% of the symbol.
    M,
    /// Recovers about 25% of the symbol.
    Q,
    /// Recovers about 30% of the symbol.
    #[default]
    H,
}

/// QR rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Error correction level.
    pub error_correction: ErrorCorrection,
    /// Minimum edge length of the rendered image in pixels.
    pub size: u32,
}

/// Identity form rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Accept subjects younger than one year (derived age 0).
    pub allow_infants: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            key: "user_measurements".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.thingspeak.com".to_string(),
            channel_id: 2_965_660,
            fields: FieldMap::default(),
            timeout_secs: 10,
        }
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            weight: 1,
            height: 2,
            infant_height: 3,
        }
    }
}

impl FieldMap {
    /// Field to read the height from for a subject of the given age band.
    #[must_use]
    pub fn height_field(&self, age_at_least_one_year: bool) -> u8 {
        if age_at_least_one_year {
            self.height
        } else {
            self.infant_height
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            api_key: None,
            table_name: "measurements".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SinkConfig {
    /// Whether records should actually be mirrored.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.url.is_some()
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::H,
            size: 300,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GROWTHRECORDER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("GROWTHRECORDER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist.
    ///
    /// Unlike [`load_from`](Self::load_from), a missing file is an error
    /// rather than a fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, or if loading or
    /// validation fails.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(figment::Error::from(format!(
                "config file not found: {}",
                path.display()
            ))
            .into());
        }
        Self::load_from(Some(path.to_path_buf()))
    }

    /// A copy safe to print, with credentials masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.sink.api_key.is_some() {
            config.sink.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.key.trim().is_empty() {
            return Err(invalid("storage.key must not be empty"));
        }

        let fields = self.telemetry.fields;
        for (name, index) in [
            ("weight", fields.weight),
            ("height", fields.height),
            ("infant_height", fields.infant_height),
        ] {
            if index == 0 || index > MAX_CHANNEL_FIELDS {
                return Err(invalid(format!(
                    "telemetry.fields.{name} must be between 1 and {MAX_CHANNEL_FIELDS}, got {index}"
                )));
            }
        }
        if fields.weight == fields.height || fields.weight == fields.infant_height {
            return Err(invalid(
                "telemetry.fields.weight must differ from the height fields",
            ));
        }

        if self.telemetry.timeout_secs == 0 || self.sink.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be greater than 0"));
        }

        if self.sink.table_name.trim().is_empty() {
            return Err(invalid("sink.table_name must not be empty"));
        }
        if self.sink.enabled {
            if let Some(url) = &self.sink.url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(invalid(format!("sink.url must be an http(s) URL: {url}")));
                }
            }
        }

        if self.qr.size == 0 {
            return Err(invalid("qr.size must be greater than 0"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the telemetry request timeout as a Duration.
    #[must_use]
    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry.timeout_secs)
    }

    /// Get the remote sink request timeout as a Duration.
    #[must_use]
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink.timeout_secs)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
