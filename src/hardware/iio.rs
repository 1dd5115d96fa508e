//! Linux Industrial I/O (IIO) sysfs drivers.
//!
//! On a Raspberry Pi the device-tree overlays `dht11`, `i2c-sensor,bmp180` and
//! `mcp3008` bind kernel drivers that expose each channel as a text attribute:
//!
//! | driver   | attribute                    | unit      |
//! |----------|------------------------------|-----------|
//! | dht11    | `in_temp_input`              | m°C       |
//! | dht11    | `in_humidityrelative_input`  | m%RH      |
//! | bmp280   | `in_pressure_input`          | kPa       |
//! | mcp320x  | `in_voltage<N>_raw`          | raw code  |
//!
//! The kernel already retries the bus transaction; a failed read surfaces as an
//! I/O error (`ETIMEDOUT` for a silent DHT, `EIO` for a NACK) which maps onto
//! [`SensorError`].

use super::{AnalogConverter, Barometer, Hygrometer};
use crate::error::SensorError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One device directory under `/sys/bus/iio/devices`.
#[derive(Clone, Debug)]
pub struct IioDevice {
    path: PathBuf,
}

impl IioDevice {
    /// Device `name` under `root`.
    pub fn new(root: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: root.as_ref().join(name),
        }
    }

    /// Device directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the kernel driver has bound the device.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    async fn read_attribute(&self, attribute: &str) -> Result<String, SensorError> {
        let raw = tokio::fs::read_to_string(self.path.join(attribute)).await?;
        Ok(raw.trim().to_string())
    }

    async fn read_f64(&self, attribute: &str) -> Result<f64, SensorError> {
        let raw = self.read_attribute(attribute).await?;
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| SensorError::InvalidData(format!("{attribute}: '{raw}'")))
    }
}

/// DHT11/DHT22 probe through the `dht11` kernel driver.
pub struct IioHygrometer {
    device: IioDevice,
}

impl IioHygrometer {
    /// Driver reading `device`.
    pub fn new(device: IioDevice) -> Self {
        Self { device }
    }
}

#[async_trait(?Send)]
impl Hygrometer for IioHygrometer {
    async fn read_temperature(&mut self) -> Result<f64, SensorError> {
        Ok(self.device.read_f64("in_temp_input").await? / 1000.0)
    }

    async fn read_humidity(&mut self) -> Result<f64, SensorError> {
        Ok(self.device.read_f64("in_humidityrelative_input").await? / 1000.0)
    }
}

/// BMP180 through the `bmp280` kernel driver.
pub struct IioBarometer {
    device: IioDevice,
}

impl IioBarometer {
    /// Driver reading `device`.
    pub fn new(device: IioDevice) -> Self {
        Self { device }
    }
}

#[async_trait(?Send)]
impl Barometer for IioBarometer {
    async fn read_pressure(&mut self) -> Result<f64, SensorError> {
        // kPa -> hPa
        Ok(self.device.read_f64("in_pressure_input").await? * 10.0)
    }
}

/// MCP3008 through the `mcp320x` kernel driver.
pub struct IioConverter {
    device: IioDevice,
}

impl IioConverter {
    /// Driver reading `device`.
    pub fn new(device: IioDevice) -> Self {
        Self { device }
    }
}

#[async_trait(?Send)]
impl AnalogConverter for IioConverter {
    async fn read_raw(&mut self, channel: u8) -> Result<u16, SensorError> {
        let attribute = format!("in_voltage{channel}_raw");
        let raw = self.device.read_attribute(&attribute).await?;
        raw.parse::<u16>()
            .map_err(|_| SensorError::InvalidData(format!("{attribute}: '{raw}'")))
    }
}
