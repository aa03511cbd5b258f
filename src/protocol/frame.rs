//! Outbound telemetry frame.
//!
//! Layout (big-endian, no padding, 119 bytes):
//!
//! ```text
//! 0   signature   2   A5 5A
//! 2   version     3   major minor patch
//! 5   channel 0  19   ┐
//! ...                 │ humidity(2) diff(3) c1(3) c2(3) filtered(3) temp(2) chip temp(3)
//! 100 channel 5  19   ┘
//! ```

use crate::drivers::ad7746;
use crate::CHANNEL_COUNT;

pub const SIGNATURE: [u8; 2] = [0xA5, 0x5A];
pub const FIRMWARE_VERSION: [u8; 3] = [0, 0, 2];

pub const HEADER_LEN: usize = 5;
pub const BLOCK_LEN: usize = 19;
pub const FRAME_LEN: usize = HEADER_LEN + CHANNEL_COUNT * BLOCK_LEN;

/// Per-channel slice of the telemetry frame, raw device bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelBlock {
    pub humidity: [u8; 2],
    pub differential: [u8; 3],
    pub c1: [u8; 3],
    pub c2: [u8; 3],
    pub filtered: [u8; 3],
    pub temperature: [u8; 2],
    pub chip_temperature: [u8; 3],
}

impl ChannelBlock {
    pub const ZERO: Self = Self {
        humidity: [0; 2],
        differential: [0; 3],
        c1: [0; 3],
        c2: [0; 3],
        filtered: [0; 3],
        temperature: [0; 2],
        chip_temperature: [0; 3],
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Zeroes the humidity/temperature fields, used while that sensor is down.
    pub fn clear_climate(&mut self) {
        self.humidity = [0; 2];
        self.temperature = [0; 2];
    }

    pub fn differential_picofarads(&self) -> f64 {
        ad7746::raw_to_picofarads(u24_from_be(self.differential))
    }

    pub fn filtered_picofarads(&self) -> f64 {
        ad7746::raw_to_picofarads(u24_from_be(self.filtered))
    }

    fn write_to(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.humidity);
        out[2..5].copy_from_slice(&self.differential);
        out[5..8].copy_from_slice(&self.c1);
        out[8..11].copy_from_slice(&self.c2);
        out[11..14].copy_from_slice(&self.filtered);
        out[14..16].copy_from_slice(&self.temperature);
        out[16..19].copy_from_slice(&self.chip_temperature);
    }

    fn read_from(buf: &[u8]) -> Self {
        let mut b = Self::ZERO;
        b.humidity.copy_from_slice(&buf[0..2]);
        b.differential.copy_from_slice(&buf[2..5]);
        b.c1.copy_from_slice(&buf[5..8]);
        b.c2.copy_from_slice(&buf[8..11]);
        b.filtered.copy_from_slice(&buf[11..14]);
        b.temperature.copy_from_slice(&buf[14..16]);
        b.chip_temperature.copy_from_slice(&buf[16..19]);
        b
    }
}

/// The record served upstream on every exchange.
///
/// Fields are always present; a channel without data carries zeroes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryFrame {
    pub signature: [u8; 2],
    pub version: [u8; 3],
    pub channels: [ChannelBlock; CHANNEL_COUNT],
}

impl TelemetryFrame {
    /// All-zero frame, header included.
    pub const fn new() -> Self {
        Self {
            signature: [0; 2],
            version: [0; 3],
            channels: [ChannelBlock::ZERO; CHANNEL_COUNT],
        }
    }

    pub fn write_header(&mut self) {
        self.signature = SIGNATURE;
        self.version = FIRMWARE_VERSION;
    }

    pub fn has_valid_header(&self) -> bool {
        self.signature == SIGNATURE && self.version == FIRMWARE_VERSION
    }

    /// Zeroes one channel block and restores the header.
    pub fn clear_channel(&mut self, index: usize) {
        self.write_header();
        self.channels[index] = ChannelBlock::ZERO;
    }

    pub fn serialize(&self, out: &mut [u8; FRAME_LEN]) {
        out[0..2].copy_from_slice(&self.signature);
        out[2..5].copy_from_slice(&self.version);
        for (block, chunk) in self
            .channels
            .iter()
            .zip(out[HEADER_LEN..].chunks_exact_mut(BLOCK_LEN))
        {
            block.write_to(chunk);
        }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        self.serialize(&mut out);
        out
    }

    pub fn from_bytes(buf: &[u8; FRAME_LEN]) -> Self {
        let mut frame = Self::new();
        frame.signature.copy_from_slice(&buf[0..2]);
        frame.version.copy_from_slice(&buf[2..5]);
        for (block, chunk) in frame
            .channels
            .iter_mut()
            .zip(buf[HEADER_LEN..].chunks_exact(BLOCK_LEN))
        {
            *block = ChannelBlock::read_from(chunk);
        }
        frame
    }
}

impl Default for TelemetryFrame {
    fn default() -> Self {
        Self::new()
    }
}

pub fn u24_from_be(b: [u8; 3]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32
}

/// Packs the low 24 bits of `v`.
pub fn u24_to_be(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_119_bytes() {
        assert_eq!(FRAME_LEN, 119);
        assert_eq!(TelemetryFrame::new().to_bytes().len(), 119);
    }

    #[test]
    fn fields_land_at_their_documented_offsets() {
        let mut frame = TelemetryFrame::new();
        frame.write_header();
        frame.channels[1] = ChannelBlock {
            humidity: [0x01, 0x02],
            differential: [0x03, 0x04, 0x05],
            c1: [0x06, 0x07, 0x08],
            c2: [0x09, 0x0A, 0x0B],
            filtered: [0x0C, 0x0D, 0x0E],
            temperature: [0x0F, 0x10],
            chip_temperature: [0x11, 0x12, 0x13],
        };
        let bytes = frame.to_bytes();

        assert_eq!(&bytes[..5], &[0xA5, 0x5A, 0, 0, 2]);
        assert!(bytes[5..24].iter().all(|&b| b == 0));
        let expected: [u8; 19] = core::array::from_fn(|i| i as u8 + 1);
        assert_eq!(&bytes[24..43], &expected);
        assert!(bytes[43..].iter().all(|&b| b == 0));
    }

    #[test]
    fn clear_channel_restores_header_and_zeroes_only_that_block() {
        let mut frame = TelemetryFrame::new();
        frame.channels[2].c1 = [1, 2, 3];
        frame.channels[4].temperature = [9, 9];
        frame.clear_channel(4);

        assert!(frame.has_valid_header());
        assert!(frame.channels[4].is_zero());
        assert_eq!(frame.channels[2].c1, [1, 2, 3]);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let mut frame = TelemetryFrame::new();
        frame.write_header();
        frame.channels[5].filtered = [0x80, 0x00, 0x01];
        frame.channels[0].humidity = [0x7F, 0xFF];
        assert_eq!(TelemetryFrame::from_bytes(&frame.to_bytes()), frame);
    }

    #[test]
    fn block_reports_picofarads() {
        let mut b = ChannelBlock::ZERO;
        b.differential = [0x80, 0x00, 0x00];
        assert!(b.differential_picofarads().abs() < 1e-12);
        assert_eq!(b.filtered_picofarads(), -4.096);
    }

    #[test]
    fn u24_packing_is_big_endian() {
        assert_eq!(u24_to_be(0x123456), [0x12, 0x34, 0x56]);
        assert_eq!(u24_from_be([0xAB, 0xCD, 0xEF]), 0xABCDEF);
        assert_eq!(u24_to_be(0x01FF_FFFF), [0xFF, 0xFF, 0xFF]);
    }
}
