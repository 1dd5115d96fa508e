//! Hardware contracts and drivers.
//!
//! The acquisition core only ever sees three capabilities:
//!
//! - [`Hygrometer`] - temperature and relative humidity from one probe
//! - [`Barometer`] - absolute pressure in hPa
//! - [`AnalogConverter`] - raw 10-bit codes from a multiplexed ADC
//!
//! The register-level [`Mcp3008`] and [`Bmp180`] drivers sit on the
//! `embedded-hal-async` bus traits (`SpiDevice`, `I2c`), so any HAL bus
//! implementation can carry them. On a Raspberry Pi the kernel's IIO drivers
//! usually own the buses already, so the default backend reads their sysfs
//! attributes through the types in [`iio`]. The [`mock`] module emulates the
//! devices at bus level for `--simulate` runs and tests.
//!
//! The runtime is single-threaded, so sensor futures are not required to be
//! `Send`; the bus traits' futures carry no such bound either.

pub mod bmp180;
pub mod iio;
pub mod mcp3008;
pub mod mock;

pub use bmp180::Bmp180;
pub use mcp3008::Mcp3008;

use crate::config::HardwareConfig;
use crate::error::{AppResult, DaqError, SensorError};
use async_trait::async_trait;
use tracing::{info, warn};

/// Temperature/humidity probe.
#[async_trait(?Send)]
pub trait Hygrometer: Send {
    /// Air temperature in °C.
    async fn read_temperature(&mut self) -> Result<f64, SensorError>;

    /// Relative humidity in %.
    async fn read_humidity(&mut self) -> Result<f64, SensorError>;
}

/// Barometric pressure sensor.
#[async_trait(?Send)]
pub trait Barometer: Send {
    /// Absolute pressure in hPa.
    async fn read_pressure(&mut self) -> Result<f64, SensorError>;
}

/// Multiplexed analog-to-digital converter.
#[async_trait(?Send)]
pub trait AnalogConverter: Send {
    /// Raw conversion result of one single-ended channel.
    async fn read_raw(&mut self, channel: u8) -> Result<u16, SensorError>;
}

/// The physical devices of one logger, owned by the acquisition cycle.
pub struct SensorSuite {
    /// Temperature/humidity probe.
    pub hygrometer: Box<dyn Hygrometer>,
    /// Pressure sensor.
    pub barometer: Box<dyn Barometer>,
    /// Converter shared by the analog channels.
    pub converter: Box<dyn AnalogConverter>,
}

impl SensorSuite {
    /// Bus-level emulation of the probe, the BMP180 and the MCP3008.
    pub fn simulated() -> Self {
        Self {
            hygrometer: Box::new(mock::MockHygrometer::new()),
            barometer: Box::new(Bmp180::new(mock::MockI2c::new())),
            converter: Box::new(Mcp3008::new(mock::MockSpi::new())),
        }
    }

    /// Kernel IIO devices under `config.iio_root`.
    ///
    /// A missing device is only logged: its metrics stay empty until the
    /// driver appears, the logger keeps running.
    pub fn iio(config: &HardwareConfig) -> Self {
        let hygrometer = iio::IioDevice::new(&config.iio_root, &config.hygrometer);
        let barometer = iio::IioDevice::new(&config.iio_root, &config.barometer);
        let converter = iio::IioDevice::new(&config.iio_root, &config.converter);

        for (role, device) in [
            ("hygrometer", &hygrometer),
            ("barometer", &barometer),
            ("converter", &converter),
        ] {
            if !device.exists() {
                warn!(role, path = %device.path().display(), "IIO device not found");
            }
        }

        Self {
            hygrometer: Box::new(iio::IioHygrometer::new(hygrometer)),
            barometer: Box::new(iio::IioBarometer::new(barometer)),
            converter: Box::new(iio::IioConverter::new(converter)),
        }
    }

    /// Build the suite selected by `config.backend`.
    pub fn connect(config: &HardwareConfig) -> AppResult<Self> {
        info!(backend = %config.backend, "connecting sensors");
        match config.backend.as_str() {
            "iio" => Ok(Self::iio(config)),
            "simulated" => Ok(Self::simulated()),
            other => Err(DaqError::Configuration(format!(
                "Invalid hardware backend '{}'",
                other
            ))),
        }
    }
}
