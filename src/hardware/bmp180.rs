//! Bosch BMP180 barometric pressure sensor over I2C.
//!
//! The sensor reports uncompensated temperature (UT) and pressure (UP); the
//! true values come from the integer algorithm in the datasheet, using eleven
//! calibration coefficients stored in the chip's EEPROM. The coefficients are
//! read once, on the first successful measurement, and cached.

use super::Barometer;
use crate::error::{i2c_fault, SensorError};
use async_trait::async_trait;
use embedded_hal_async::i2c::I2c;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Fixed I2C address of the BMP180.
pub const DEFAULT_ADDRESS: u8 = 0x77;
/// Value of the chip-id register.
pub const CHIP_ID: u8 = 0x55;

/// Chip id and version registers.
pub const REG_CHIP_ID: u8 = 0xD0;
/// Start of the calibration EEPROM.
pub const REG_CALIBRATION: u8 = 0xAA;
/// Measurement control register.
pub const REG_CONTROL: u8 = 0xF4;
/// Conversion result, MSB first.
pub const REG_DATA: u8 = 0xF6;
/// Control value starting a temperature conversion.
pub const CMD_TEMPERATURE: u8 = 0x2E;
/// Control value starting a pressure conversion; oversampling goes in bits 6-7.
pub const CMD_PRESSURE: u8 = 0x34;

/// Length of the calibration EEPROM block.
pub const CALIBRATION_LEN: usize = 22;

/// Ultra-high-resolution oversampling (8 samples per conversion).
pub const OVERSAMPLING_ULTRA_HIGH: u8 = 3;

/// Maximum conversion times from the datasheet, indexed by oversampling.
const PRESSURE_WAIT_MS: [u64; 4] = [5, 8, 14, 26];
const TEMPERATURE_WAIT_MS: u64 = 5;

/// EEPROM calibration coefficients, named as in the datasheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    /// Decode the big-endian EEPROM block.
    ///
    /// Words reading 0x0000 or 0xFFFF indicate a failed EEPROM read.
    pub fn from_bytes(raw: &[u8; CALIBRATION_LEN]) -> Result<Self, SensorError> {
        let mut words = [0u16; CALIBRATION_LEN / 2];
        for (word, pair) in words.iter_mut().zip(raw.chunks_exact(2)) {
            *word = u16::from_be_bytes([pair[0], pair[1]]);
            if *word == 0x0000 || *word == 0xFFFF {
                return Err(SensorError::Checksum);
            }
        }
        let signed = |i: usize| words[i] as i16;

        Ok(Self {
            ac1: signed(0),
            ac2: signed(1),
            ac3: signed(2),
            ac4: words[3],
            ac5: words[4],
            ac6: words[5],
            b1: signed(6),
            b2: signed(7),
            mb: signed(8),
            mc: signed(9),
            md: signed(10),
        })
    }

    /// True temperature (°C) and pressure (hPa) from raw readings.
    ///
    /// Raw values that would divide by zero give `InvalidData`.
    pub fn compensate(&self, ut: i64, up: i64, oversampling: u8) -> Result<(f64, f64), SensorError> {
        let degenerate = || {
            SensorError::InvalidData(format!(
                "BMP180 compensation undefined for ut={} up={}",
                ut, up
            ))
        };
        let oss = i64::from(oversampling.min(OVERSAMPLING_ULTRA_HIGH));
        let (ac1, ac2, ac3) = (i64::from(self.ac1), i64::from(self.ac2), i64::from(self.ac3));
        let (ac4, ac5, ac6) = (i64::from(self.ac4), i64::from(self.ac5), i64::from(self.ac6));
        let (b1, b2) = (i64::from(self.b1), i64::from(self.b2));
        let (mc, md) = (i64::from(self.mc), i64::from(self.md));

        let x1 = ((ut - ac6) * ac5) >> 15;
        let x2 = (mc << 11).checked_div(x1 + md).ok_or_else(degenerate)?;
        let b5 = x1 + x2;
        let temperature = ((b5 + 8) >> 4) as f64 / 10.0;

        let b6 = b5 - 4000;
        let x1 = (b2 * ((b6 * b6) >> 12)) >> 11;
        let x2 = (ac2 * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = (((ac1 * 4 + x3) << oss) + 2) >> 2;
        let x1 = (ac3 * b6) >> 13;
        let x2 = (b1 * ((b6 * b6) >> 12)) >> 16;
        let x3 = (x1 + x2 + 2) >> 2;
        let b4 = (ac4 * (x3 + 32768)) >> 15;
        let b7 = (up - b3) * (50000 >> oss);
        let p = if b7 < 0x8000_0000 {
            (b7 * 2).checked_div(b4).ok_or_else(degenerate)?
        } else {
            b7.checked_div(b4).ok_or_else(degenerate)? * 2
        };

        let x1 = (p >> 8)
            .checked_mul(p >> 8)
            .and_then(|square| square.checked_mul(3038))
            .ok_or_else(degenerate)?
            >> 16;
        let x2 = (-7357 * p) >> 16;
        let pascal = p + ((x1 + x2 + 3791) >> 4);

        Ok((temperature, pascal as f64 / 100.0))
    }
}

/// Driver over any `embedded-hal-async` I2C bus.
pub struct Bmp180<I> {
    bus: I,
    address: u8,
    oversampling: u8,
    calibration: Option<Calibration>,
}

impl<I: I2c> Bmp180<I> {
    /// Driver for a chip at [`DEFAULT_ADDRESS`].
    pub fn new(bus: I) -> Self {
        Self::with_address(bus, DEFAULT_ADDRESS)
    }

    /// Driver for a chip at `address`.
    pub fn with_address(bus: I, address: u8) -> Self {
        Self {
            bus,
            address,
            oversampling: OVERSAMPLING_ULTRA_HIGH,
            calibration: None,
        }
    }

    /// Chip id and version registers.
    pub async fn chip_id(&mut self) -> Result<(u8, u8), SensorError> {
        let mut id = [0u8; 2];
        self.read_registers(REG_CHIP_ID, &mut id).await?;
        Ok((id[0], id[1]))
    }

    async fn calibration(&mut self) -> Result<Calibration, SensorError> {
        if let Some(calibration) = self.calibration {
            return Ok(calibration);
        }

        let (id, version) = self.chip_id().await?;
        if id != CHIP_ID {
            return Err(SensorError::InvalidData(format!(
                "unexpected chip id 0x{:02X} at address 0x{:02X}",
                id, self.address
            )));
        }

        let mut raw = [0u8; CALIBRATION_LEN];
        self.read_registers(REG_CALIBRATION, &mut raw).await?;
        let calibration = Calibration::from_bytes(&raw)?;
        debug!(version, ?calibration, "BMP180 calibration loaded");
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.bus
            .write_read(self.address, &[register], buf)
            .await
            .map_err(i2c_fault)
    }

    async fn start_conversion(&mut self, command: u8) -> Result<(), SensorError> {
        self.bus
            .write(self.address, &[REG_CONTROL, command])
            .await
            .map_err(i2c_fault)
    }

    async fn raw_temperature(&mut self) -> Result<i64, SensorError> {
        self.start_conversion(CMD_TEMPERATURE).await?;
        sleep(Duration::from_millis(TEMPERATURE_WAIT_MS)).await;
        let mut data = [0u8; 2];
        self.read_registers(REG_DATA, &mut data).await?;
        Ok(i64::from(u16::from_be_bytes(data)))
    }

    async fn raw_pressure(&mut self) -> Result<i64, SensorError> {
        let oss = self.oversampling;
        self.start_conversion(CMD_PRESSURE + (oss << 6)).await?;
        sleep(Duration::from_millis(PRESSURE_WAIT_MS[usize::from(oss)])).await;
        let mut data = [0u8; 3];
        self.read_registers(REG_DATA, &mut data).await?;
        let raw = (i64::from(data[0]) << 16) | (i64::from(data[1]) << 8) | i64::from(data[2]);
        Ok(raw >> (8 - i64::from(oss)))
    }

    /// Compensated temperature (°C) and pressure (hPa).
    pub async fn measure(&mut self) -> Result<(f64, f64), SensorError> {
        let calibration = self.calibration().await?;
        let ut = self.raw_temperature().await?;
        let up = self.raw_pressure().await?;
        calibration.compensate(ut, up, self.oversampling)
    }
}

#[async_trait(?Send)]
impl<I: I2c + Send> Barometer for Bmp180<I> {
    async fn read_pressure(&mut self) -> Result<f64, SensorError> {
        let (_, pressure) = self.measure().await?;
        Ok(pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockI2c;

    /// Worked example from the BMP180 datasheet.
    fn datasheet_calibration() -> Calibration {
        Calibration {
            ac1: 408,
            ac2: -72,
            ac3: -14383,
            ac4: 32741,
            ac5: 32757,
            ac6: 23153,
            b1: 6190,
            b2: 4,
            mb: -32768,
            mc: -8711,
            md: 2868,
        }
    }

    #[test]
    fn test_datasheet_example() {
        let (temperature, pressure) = datasheet_calibration().compensate(27898, 23843, 0).unwrap();
        assert_eq!(temperature, 15.0);
        assert!((pressure - 699.64).abs() < 1e-9, "pressure was {pressure}");
    }

    #[test]
    fn test_sea_level_at_ultra_high_resolution() {
        let (_, pressure) = datasheet_calibration().compensate(27898, 274_643, 3).unwrap();
        assert!((pressure - 1013.25).abs() < 1e-9, "pressure was {pressure}");
    }

    #[test]
    fn test_degenerate_raw_temperature_is_invalid_data() {
        // x1 + md == 0 with the datasheet coefficients
        let result = datasheet_calibration().compensate(20285, 23843, 0);
        assert!(matches!(result, Err(SensorError::InvalidData(_))));
    }

    #[test]
    fn test_zero_b4_is_invalid_data() {
        let calibration = Calibration {
            ac4: 0,
            ..datasheet_calibration()
        };
        let result = calibration.compensate(27898, 23843, 0);
        assert!(matches!(result, Err(SensorError::InvalidData(_))));
    }

    #[test]
    fn test_runaway_pressure_is_invalid_data() {
        let calibration = Calibration {
            ac4: 1,
            ..datasheet_calibration()
        };
        let result = calibration.compensate(27898, 0x7FFFF, 0);
        assert!(matches!(result, Err(SensorError::InvalidData(_))));
    }

    #[test]
    fn test_calibration_decoding() {
        let cal = datasheet_calibration();
        let mut raw = [0u8; CALIBRATION_LEN];
        let words: [u16; 11] = [
            cal.ac1 as u16,
            cal.ac2 as u16,
            cal.ac3 as u16,
            cal.ac4,
            cal.ac5,
            cal.ac6,
            cal.b1 as u16,
            cal.b2 as u16,
            cal.mb as u16,
            cal.mc as u16,
            cal.md as u16,
        ];
        for (chunk, word) in raw.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        assert_eq!(Calibration::from_bytes(&raw), Ok(cal));

        raw[0] = 0xFF;
        raw[1] = 0xFF;
        assert_eq!(Calibration::from_bytes(&raw), Err(SensorError::Checksum));
    }

    #[tokio::test]
    async fn test_measure_against_emulated_chip() {
        let mut sensor = Bmp180::new(MockI2c::new());
        assert_eq!(sensor.chip_id().await.unwrap().0, CHIP_ID);

        let (temperature, pressure) = sensor.measure().await.unwrap();
        assert_eq!(temperature, 15.0);
        assert!((900.0..1100.0).contains(&pressure), "pressure was {pressure}");
    }

    #[tokio::test]
    async fn test_wrong_address_is_bus_fault() {
        let mut sensor = Bmp180::with_address(MockI2c::new(), 0x76);
        let err = sensor.read_pressure().await.unwrap_err();
        assert!(matches!(err, SensorError::Bus(_)));
    }
}
