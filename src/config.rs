//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//! Every section and field is optional; missing values take their defaults.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RcioError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on waiting for one response buffer
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Transfer engine configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransferConfig {
    /// Delay before each write and before each read
    #[serde(default = "default_pacing_us")]
    pub pacing_us: u64,
}

/// Device session configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,

    /// Log each snapshot as JSON instead of a summary line
    #[serde(default)]
    pub json_snapshots: bool,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 1_500_000 }
fn default_timeout_ms() -> u64 { 100 }

fn default_pacing_us() -> u64 { 150 }

fn default_refresh_interval_ms() -> u64 { 1000 }

const SUPPORTED_BAUD_RATES: [u32; 4] = [115_200, 230_400, 921_600, 1_500_000];

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { pacing_us: default_pacing_us() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { refresh_interval_ms: default_refresh_interval_ms() }
    }
}

impl TransferConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_micros(self.pacing_us)
    }
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

fn invalid(message: &str) -> RcioError {
    RcioError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rcio_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 115200, 230400, 921600, 1500000"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10_000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.transfer.pacing_us > 100_000 {
            return Err(invalid("pacing_us must be between 0 and 100000"));
        }

        if self.session.refresh_interval_ms == 0 || self.session.refresh_interval_ms > 60_000 {
            return Err(invalid("refresh_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}
