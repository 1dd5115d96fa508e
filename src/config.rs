//! Configuration system using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (`config/logger.toml` by default)
//! 2. Environment variables (prefixed with `ENV_DAQ_`, nested keys split on `__`)
//!
//! # Environment Variable Overrides
//!
//! ```text
//! ENV_DAQ_LOGGER__LOG_LEVEL=debug
//! ENV_DAQ_LOGGER__LOG_INTERVAL=30
//! ENV_DAQ_HARDWARE__BACKEND=simulated
//! ```
//!
//! The resolved [`Settings`] are validated once at startup and are immutable
//! for the lifetime of the process.

use crate::error::{AppResult, DaqError};
use crate::measurement::Metric;
use crate::validation::{Limits, ValidationPolicy};
use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Highest raw code of the 10-bit converter.
pub const MAX_ADC_CODE: u16 = 1023;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// `[logger]`, required
    pub logger: LoggerConfig,
    /// `[validation]`
    #[serde(default)]
    pub validation: ValidationConfig,
    /// `[hardware]`
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Logging loop and journal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Folder that receives one CSV file per day
    pub data_folder: PathBuf,
    /// Seconds between the end of one cycle and the start of the next
    pub log_interval: u64,
    /// chrono strftime format for the timestamp column
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prefix of the daily file name, followed by `YYYY-MM-DD.csv`
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

/// Plausibility bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Apply the limits at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bounds keyed by metric name (`temperature`, `soil_moisture`, ...)
    #[serde(default)]
    pub limits: BTreeMap<String, Limits>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            limits: BTreeMap::new(),
        }
    }
}

/// Sensor wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Driver backend (iio or simulated)
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Root of the kernel IIO device tree
    #[serde(default = "default_iio_root")]
    pub iio_root: PathBuf,
    /// IIO device of the temperature/humidity probe (dht11 driver)
    #[serde(default = "default_hygrometer")]
    pub hygrometer: String,
    /// IIO device of the barometric sensor (bmp280 driver)
    #[serde(default = "default_barometer")]
    pub barometer: String,
    /// IIO device of the analog converter (mcp320x driver)
    #[serde(default = "default_converter")]
    pub converter: String,
    /// Retry of transient faults
    #[serde(default)]
    pub retry: RetryConfig,
    /// Analog channel wiring
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            iio_root: default_iio_root(),
            hygrometer: default_hygrometer(),
            barometer: default_barometer(),
            converter: default_converter(),
            retry: RetryConfig::default(),
            channels: ChannelsConfig::default(),
        }
    }
}

/// In-adapter retry settings for transient bus faults
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Tries per read, first one included
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    /// Pause between tries in milliseconds
    #[serde(default = "default_retry_delay")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            delay_ms: default_retry_delay(),
        }
    }
}

/// Converter channel assignment and calibration of the analog sensors
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Capacitive soil probe
    #[serde(default = "default_soil_channel")]
    pub soil_moisture: ChannelCalibration,
    /// Photoresistor divider
    #[serde(default = "default_light_channel")]
    pub light: ChannelCalibration,
    /// Rain plate
    #[serde(default = "default_rain_channel")]
    pub rain: ChannelCalibration,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            soil_moisture: default_soil_channel(),
            light: default_light_channel(),
            rain: default_rain_channel(),
        }
    }
}

/// Linear map from raw converter code to percent.
///
/// `empty` maps to 0 % and `full` to 100 %; `empty > full` gives the inverted
/// map used by sensors whose output drops as the quantity rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    /// Converter input, 0-7
    pub channel: u8,
    /// Raw code read at 0 %
    pub empty: u16,
    /// Raw code read at 100 %
    pub full: u16,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "sensor_data_".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_backend() -> String {
    "iio".to_string()
}

fn default_iio_root() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices")
}

fn default_hygrometer() -> String {
    "iio:device0".to_string()
}

fn default_barometer() -> String {
    "iio:device1".to_string()
}

fn default_converter() -> String {
    "iio:device2".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

// Calibration measured on the reference install (dry air / water).
fn default_soil_channel() -> ChannelCalibration {
    ChannelCalibration {
        channel: 0,
        empty: 930,
        full: 415,
    }
}

fn default_light_channel() -> ChannelCalibration {
    ChannelCalibration {
        channel: 1,
        empty: MAX_ADC_CODE,
        full: 0,
    }
}

fn default_rain_channel() -> ChannelCalibration {
    ChannelCalibration {
        channel: 2,
        empty: MAX_ADC_CODE,
        full: 300,
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_BACKENDS: [&str; 2] = ["iio", "simulated"];

/// Reject strftime patterns chrono cannot render.
pub(crate) fn check_timestamp_format(format: &str) -> AppResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(DaqError::Configuration(format!(
            "Invalid timestamp_format '{}'",
            format
        )));
    }
    Ok(())
}

impl Settings {
    /// Load configuration from a TOML file with `ENV_DAQ_` overrides, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed("ENV_DAQ_").split("__")),
        )
    }

    /// Parse configuration from an in-memory TOML document, then validate.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> AppResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks interval, log level, backend, timestamp format, every limit and
    /// every channel calibration.
    pub fn validate(&self) -> AppResult<()> {
        if self.logger.log_interval < 1 {
            return Err(DaqError::Configuration(
                "logger.log_interval must be at least 1 second".to_string(),
            ));
        }

        if !VALID_LEVELS.contains(&self.logger.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.logger.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        check_timestamp_format(&self.logger.timestamp_format)?;

        if !VALID_BACKENDS.contains(&self.hardware.backend.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid hardware backend '{}'. Must be one of: {}",
                self.hardware.backend,
                VALID_BACKENDS.join(", ")
            )));
        }

        if self.hardware.retry.attempts < 1 {
            return Err(DaqError::Configuration(
                "hardware.retry.attempts must be at least 1".to_string(),
            ));
        }

        self.validation_limits()?;

        let channels = &self.hardware.channels;
        let mut used = std::collections::HashSet::new();
        for (name, cal) in [
            ("soil_moisture", channels.soil_moisture),
            ("light", channels.light),
            ("rain", channels.rain),
        ] {
            if cal.channel > 7 {
                return Err(DaqError::Configuration(format!(
                    "Channel {} for '{}' does not exist (0-7)",
                    cal.channel, name
                )));
            }
            if !used.insert(cal.channel) {
                return Err(DaqError::Configuration(format!(
                    "Channel {} is assigned to more than one sensor",
                    cal.channel
                )));
            }
            if cal.empty > MAX_ADC_CODE || cal.full > MAX_ADC_CODE || cal.empty == cal.full {
                return Err(DaqError::Configuration(format!(
                    "Invalid calibration for '{}': empty={} full={} (codes 0-{}, must differ)",
                    name, cal.empty, cal.full, MAX_ADC_CODE
                )));
            }
        }

        Ok(())
    }

    /// Bounds keyed by metric, checked for unknown names and `min <= max`.
    pub fn validation_limits(&self) -> AppResult<HashMap<Metric, Limits>> {
        let mut limits = HashMap::new();
        for (name, bounds) in &self.validation.limits {
            let metric: Metric = name.parse().map_err(DaqError::Configuration)?;
            if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min > bounds.max {
                return Err(DaqError::Configuration(format!(
                    "Invalid limits for '{}': min={} max={}",
                    name, bounds.min, bounds.max
                )));
            }
            limits.insert(metric, *bounds);
        }
        Ok(limits)
    }

    /// The validation policy described by this configuration.
    pub fn validation_policy(&self) -> AppResult<ValidationPolicy> {
        Ok(ValidationPolicy::new(
            self.validation.enabled,
            self.validation_limits()?,
        ))
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.logger.log_interval)
    }
}
