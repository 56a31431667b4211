//! Application configuration loader and validator
//!
//! Loads the front-end configuration (logging, transport, storage) from a TOML
//! file. Every field has a default, so an empty file is a valid configuration.

use crate::transport::ble_serial::BleSerialOptions;
use crate::transport::constants::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "configs/default.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which transport the front-end drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// BLE serial bridge through the host adapter
    #[default]
    Ble,
    /// In-memory car, for trying the front-end without hardware
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// Discovery window in seconds (1..=60)
    #[serde(default = "default_scan_seconds")]
    pub scan_seconds: u64,

    #[serde(default = "default_service_uuid")]
    pub service_uuid: Uuid,

    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: Uuid,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            scan_seconds: default_scan_seconds(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
        }
    }
}

impl TransportConfig {
    pub fn ble_options(&self) -> BleSerialOptions {
        BleSerialOptions {
            scan_duration: Duration::from_secs(self.scan_seconds),
            service_uuid: self.service_uuid,
            characteristic_uuid: self.characteristic_uuid,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Settings file; defaults to a file next to the executable
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_scan_seconds() -> u64 { DEFAULT_SCAN_SECONDS }
fn default_service_uuid() -> Uuid { SERIAL_SERVICE_UUID }
fn default_characteristic_uuid() -> Uuid { SERIAL_CHARACTERISTIC_UUID }

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        debug!("  - Transport: {:?}", config.transport.kind);
        debug!("  - Scan window: {}s", config.transport.scan_seconds);
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configs/default.toml, or fall back to defaults if it does not exist
    pub fn load_default() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load(DEFAULT_CONFIG_PATH)
        } else {
            info!("No {} found, using built-in configuration", DEFAULT_CONFIG_PATH);
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=60).contains(&self.transport.scan_seconds) {
            return Err(ConfigError::Invalid(
                "transport.scan_seconds must be between 1 and 60".into(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }

        if self.transport.service_uuid.is_nil() || self.transport.characteristic_uuid.is_nil() {
            return Err(ConfigError::Invalid("transport UUIDs must not be nil".into()));
        }

        Ok(())
    }
}
