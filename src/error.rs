//! Custom error types for the application.
//!
//! Two layers of errors exist, mirroring how far a failure is allowed to travel:
//!
//! - **`SensorError`**: produced by hardware drivers and adapters. It never leaves
//!   the acquisition cycle; the affected metrics are recorded as missing and the
//!   reason is logged.
//! - **`DaqError`**: the application error. Configuration problems and journal
//!   construction failures are fatal at startup, everything else is logged by the
//!   daemon and retried on the next tick.
//!
//! Validation rejections are not errors in the propagation sense and live in
//! [`crate::validation::Rejection`].

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Reason an adapter could not obtain a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// NACK, arbitration loss or a failed kernel read.
    #[error("bus fault: {0}")]
    Bus(String),

    /// The sensor did not answer in time.
    #[error("timed out waiting for sensor")]
    Timeout,

    /// Corrupt frame or EEPROM content.
    #[error("checksum mismatch")]
    Checksum,

    /// The device answered with something that cannot be a measurement.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Every retry failed with a transient error; `last` is the final one.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the final attempt.
        last: Box<SensorError>,
    },
}

impl SensorError {
    /// Whether another attempt within the same cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SensorError::Bus(_) | SensorError::Timeout | SensorError::Checksum
        )
    }
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => SensorError::Timeout,
            std::io::ErrorKind::InvalidData => SensorError::InvalidData(err.to_string()),
            _ => SensorError::Bus(err.to_string()),
        }
    }
}

impl From<embedded_hal::i2c::ErrorKind> for SensorError {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        SensorError::Bus(format!("i2c: {}", kind))
    }
}

impl From<embedded_hal::spi::ErrorKind> for SensorError {
    fn from(kind: embedded_hal::spi::ErrorKind) -> Self {
        SensorError::Bus(format!("spi: {}", kind))
    }
}

/// Map any I2C bus error through its [`ErrorKind`](embedded_hal::i2c::ErrorKind).
pub(crate) fn i2c_fault<E: embedded_hal::i2c::Error>(err: E) -> SensorError {
    err.kind().into()
}

/// Map any SPI bus error through its [`ErrorKind`](embedded_hal::spi::ErrorKind).
pub(crate) fn spi_fault<E: embedded_hal::spi::Error>(err: E) -> SensorError {
    err.kind().into()
}

/// Application-level error.
#[derive(Error, Debug)]
pub enum DaqError {
    /// The configuration could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O outside the journal.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sensor fault escalated out of the cycle.
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Creating, writing or syncing a journal file failed.
    #[error("Journal I/O error on '{}': {source}", path.display())]
    Journal {
        /// File or folder the operation was on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The crate was built without a required cargo feature.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl DaqError {
    pub(crate) fn journal(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        DaqError::Journal {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::Configuration("log_interval must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: log_interval must be at least 1"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(SensorError::Timeout.is_transient());
        assert!(SensorError::Bus("nack".into()).is_transient());
        assert!(SensorError::Checksum.is_transient());
        assert!(!SensorError::InvalidData("code 2048".into()).is_transient());
    }

    #[test]
    fn test_io_error_mapping() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "dht11 timeout");
        assert_eq!(SensorError::from(timeout), SensorError::Timeout);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "remote I/O error");
        assert!(matches!(SensorError::from(other), SensorError::Bus(_)));
    }

    #[test]
    fn test_bus_error_kinds_are_transient() {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        let nack = SensorError::from(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        assert!(matches!(nack, SensorError::Bus(_)));
        assert!(nack.is_transient());

        let spi = spi_fault(embedded_hal::spi::ErrorKind::Overrun);
        assert!(matches!(spi, SensorError::Bus(_)));
    }

    #[test]
    fn test_journal_error_names_path() {
        let err = DaqError::journal(
            "/data/sensor_data_2024-03-01.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("sensor_data_2024-03-01.csv"));
    }
}
