//! MCP3008 8-channel, 10-bit SPI converter.
//!
//! One conversion is a 3-byte full-duplex transfer: start bit, then the
//! single-ended flag and the 3-bit channel in the high nibble of byte 1. The
//! result comes back in the low two bits of byte 1 and all of byte 2.

use super::AnalogConverter;
use crate::error::{spi_fault, SensorError};
use async_trait::async_trait;
use embedded_hal_async::spi::SpiDevice;

/// Number of single-ended inputs.
pub const CHANNELS: u8 = 8;

const START_BIT: u8 = 0x01;
const SINGLE_ENDED: u8 = 0x08;

/// Driver over any SPI device with its own chip select.
pub struct Mcp3008<S> {
    spi: S,
}

impl<S> Mcp3008<S> {
    /// Driver over `spi`.
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Release the SPI device.
    pub fn into_inner(self) -> S {
        self.spi
    }

    /// Request frame for a single-ended conversion of `channel`.
    pub fn request_frame(channel: u8) -> [u8; 3] {
        [START_BIT, (SINGLE_ENDED | channel) << 4, 0x00]
    }

    /// Extract the 10-bit code from a response frame.
    pub fn decode(response: [u8; 3]) -> u16 {
        (u16::from(response[1] & 0x03) << 8) | u16::from(response[2])
    }
}

#[async_trait(?Send)]
impl<S: SpiDevice + Send> AnalogConverter for Mcp3008<S> {
    async fn read_raw(&mut self, channel: u8) -> Result<u16, SensorError> {
        if channel >= CHANNELS {
            return Err(SensorError::InvalidData(format!(
                "MCP3008 has no channel {}",
                channel
            )));
        }
        let mut frame = Self::request_frame(channel);
        self.spi
            .transfer_in_place(&mut frame)
            .await
            .map_err(spi_fault)?;
        Ok(Self::decode(frame))
    }
}
