//! Mock Hardware Implementations
//!
//! Provides simulated devices for running the logger without physical hardware.
//! The SPI and I2C mocks emulate the MCP3008 and BMP180 at bus level, so the
//! real register drivers run unchanged on top of them.
//!
//! # Available Mocks
//!
//! - `MockSpi` - MCP3008 wire protocol, slow sine on every channel
//! - `MockI2c` - BMP180 register map with the datasheet calibration
//! - `MockHygrometer` - DHT22-like probe around 21 °C / 55 %RH
//!
//! Values follow a deterministic phase instead of a random generator so runs
//! are reproducible.

use super::bmp180::{self, CALIBRATION_LEN};
use super::Hygrometer;
use crate::error::SensorError;
use async_trait::async_trait;
use embedded_hal_async::i2c::{self, I2c, NoAcknowledgeSource};
use embedded_hal_async::spi::{self, SpiDevice};

const PHASE_STEP: f64 = 0.1;

/// Small deterministic jitter on top of a waveform.
fn noise(phase: f64) -> f64 {
    (phase * 37.0).sin() * 0.05
}

// =============================================================================
// MockSpi - MCP3008 emulation
// =============================================================================

/// Emulated MCP3008 answering single-ended conversion requests.
///
/// Channel 0 idles around a moist soil reading, channel 1 around half light,
/// channel 2 around a dry rain plate. Other channels read mid-scale.
pub struct MockSpi {
    phase: f64,
    transfers: u32,
}

impl MockSpi {
    /// A converter at phase zero with no transfers made.
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            transfers: 0,
        }
    }

    /// Number of frames exchanged so far.
    pub fn transfers(&self) -> u32 {
        self.transfers
    }

    fn code(&self, channel: u8) -> u16 {
        let (base, swing) = match channel {
            0 => (650.0, 60.0),
            1 => (500.0, 300.0),
            2 => (1000.0, 15.0),
            _ => (512.0, 0.0),
        };
        let value = base + swing * (self.phase.sin() + noise(self.phase));
        value.round().clamp(0.0, 1023.0) as u16
    }
}

impl Default for MockSpi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpi {
    /// Answer one request frame; the chip stays silent on a malformed one.
    fn respond(&mut self, request: &[u8]) -> Result<[u8; 3], spi::ErrorKind> {
        match request {
            [start, config, _] if start & 0x01 != 0 && config & 0x80 != 0 => {
                let code = self.code((config >> 4) & 0x07);
                self.transfers += 1;
                self.phase += PHASE_STEP;
                Ok([0x00, ((code >> 8) & 0x03) as u8, (code & 0xFF) as u8])
            }
            _ => Err(spi::ErrorKind::Other),
        }
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for MockSpi {
    async fn transaction(
        &mut self,
        operations: &mut [spi::Operation<'_, u8>],
    ) -> Result<(), spi::ErrorKind> {
        for operation in operations {
            match operation {
                spi::Operation::TransferInPlace(words) => {
                    let response = self.respond(&words[..])?;
                    words.copy_from_slice(&response);
                }
                spi::Operation::Transfer(read, write) if read.len() == 3 => {
                    let response = self.respond(&write[..])?;
                    read.copy_from_slice(&response);
                }
                spi::Operation::DelayNs(_) => {}
                _ => return Err(spi::ErrorKind::Other),
            }
        }
        Ok(())
    }
}

// =============================================================================
// MockI2c - BMP180 emulation
// =============================================================================

/// Calibration EEPROM from the BMP180 datasheet example.
const DATASHEET_CALIBRATION: [u16; CALIBRATION_LEN / 2] = [
    408, 0xFFB8, 0xC7D1, 32741, 32757, 23153, 6190, 4, 0x8000, 0xDDF9, 2868,
];
/// Raw temperature giving 15.0 °C with the datasheet calibration.
const RAW_TEMPERATURE: u16 = 27898;
/// Raw pressure giving 1013.25 hPa at ultra-high-resolution oversampling.
const RAW_PRESSURE_SEA_LEVEL: i64 = 274_643;

/// Emulated BMP180 at the default address.
///
/// A write sets the register pointer from its first byte; a write of two
/// bytes to the control register starts a conversion. Reads return data from
/// the pointer.
pub struct MockI2c {
    pointer: u8,
    last_command: Option<u8>,
    phase: f64,
}

impl MockI2c {
    /// A chip with no conversion started.
    pub fn new() -> Self {
        Self {
            pointer: 0,
            last_command: None,
            phase: 0.0,
        }
    }

    fn register_bytes(&mut self, register: u8, len: usize) -> Result<Vec<u8>, i2c::ErrorKind> {
        match register {
            bmp180::REG_CHIP_ID => Ok(vec![bmp180::CHIP_ID, 0x02]),
            bmp180::REG_CALIBRATION => Ok(DATASHEET_CALIBRATION
                .iter()
                .flat_map(|word| word.to_be_bytes())
                .collect()),
            bmp180::REG_DATA => match self.last_command {
                Some(bmp180::CMD_TEMPERATURE) => Ok(RAW_TEMPERATURE.to_be_bytes().to_vec()),
                Some(cmd) if cmd & 0x3F == bmp180::CMD_PRESSURE && len == 3 => {
                    let oss = cmd >> 6;
                    // +/- 400 raw counts is roughly +/- 1.5 hPa
                    let up = RAW_PRESSURE_SEA_LEVEL + (400.0 * self.phase.sin()) as i64;
                    self.phase += PHASE_STEP;
                    let shifted = (up << (8 - oss)) as u32;
                    Ok(shifted.to_be_bytes()[1..].to_vec())
                }
                // no conversion started
                _ => Err(i2c::ErrorKind::Other),
            },
            _ => Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
    }
}

impl Default for MockI2c {
    fn default() -> Self {
        Self::new()
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), i2c::ErrorKind> {
        if address != bmp180::DEFAULT_ADDRESS {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations {
            match operation {
                i2c::Operation::Write(bytes) => match **bytes {
                    [register, value] if register == bmp180::REG_CONTROL => {
                        self.pointer = register;
                        self.last_command = Some(value);
                    }
                    [register, ..] => self.pointer = register,
                    [] => {}
                },
                i2c::Operation::Read(buf) => {
                    let bytes = self.register_bytes(self.pointer, buf.len())?;
                    if bytes.len() < buf.len() {
                        return Err(i2c::ErrorKind::Overrun);
                    }
                    buf.copy_from_slice(&bytes[..buf.len()]);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// MockHygrometer - DHT22-like probe
// =============================================================================

/// Emulated temperature/humidity probe.
pub struct MockHygrometer {
    phase: f64,
}

impl MockHygrometer {
    /// A probe at phase zero.
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }
}

impl Default for MockHygrometer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Hygrometer for MockHygrometer {
    async fn read_temperature(&mut self) -> Result<f64, SensorError> {
        self.phase += PHASE_STEP;
        Ok(21.0 + 3.0 * self.phase.sin() + noise(self.phase))
    }

    async fn read_humidity(&mut self) -> Result<f64, SensorError> {
        Ok(55.0 + 10.0 * self.phase.cos() + noise(self.phase))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
