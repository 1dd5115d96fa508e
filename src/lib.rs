//! Core library for the env_daq environmental logger.
//!
//! A periodic loop samples a fixed set of sensors (temperature/humidity
//! probe, barometer and three analog channels behind an MCP3008), filters
//! the values through per-metric plausibility limits and appends one row per
//! cycle to a daily-rotating CSV file. Sensor failures and rejected values
//! become empty fields; the loop itself never stops on them.

pub mod acquisition;
pub mod adapters;
pub mod config;
pub mod daemon;
pub mod data;
pub mod error;
pub mod error_recovery;
pub mod hardware;
pub mod measurement;
pub mod validation;

pub use acquisition::{AcquisitionCycle, CycleReport};
pub use config::Settings;
pub use daemon::LoggerDaemon;
pub use data::CsvJournal;
pub use error::{AppResult, DaqError, SensorError};
pub use measurement::{Metric, SensorReading};
pub use validation::ValidationPolicy;
