use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::error::{BusResultExt, Device, Error};

const ADDR: u8 = 0x48;

const REG_DATA: u8 = 0x01;
const REG_CAP_SETUP: u8 = 0x07;
const REG_VT_SETUP: u8 = 0x08;
const REG_EXC_SETUP: u8 = 0x09;
const REG_CONFIG: u8 = 0x0A;
const REG_CAP_OFFSET_H: u8 = 0x0D;

// VTEN | internal temperature sensor | VTCHOP
const VT_SETUP_INT_TEMP: u8 = 0b1000_0001;
// EXCON | EXCA | EXCLV = Vdd/2
const EXC_SETUP_A: u8 = 0b0100_1011;
// 32 ms single temperature conversion
const TEMPERATURE_CONVERSION: u8 = 0b0100_0010;

/// Full-scale span of the converter in pF (±4.096 pF).
const SPAN_PF: f64 = 8.192;
const OFFSET_PF: f64 = 4.096;
const CODES: f64 = (1u32 << 24) as f64;
const MAX_CODE: u32 = (1 << 24) - 1;

/// Value of one LSB in pF.
pub const LSB_PF: f64 = SPAN_PF / CODES;

/// Capacitor-select register settings, one per acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapMode {
    /// CIN2 differential, the primary measurement.
    Differential,
    /// CIN1 single-ended.
    C1,
    /// CIN2 single-ended.
    C2,
}

impl CapMode {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Differential => 0xE0,
            Self::C1 => 0x80,
            Self::C2 => 0xC0,
        }
    }

    /// Mode to convert after this one: cycles through all three when the
    /// full set is requested, otherwise stays on the differential input.
    pub fn next(self, full_set: bool) -> Self {
        if !full_set {
            return Self::Differential;
        }
        match self {
            Self::Differential => Self::C1,
            Self::C1 => Self::C2,
            Self::C2 => Self::Differential,
        }
    }
}

/// Capacitance conversion-time settings selectable over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionTime {
    /// 38 ms single conversion.
    Fast,
    /// 109.6 ms single conversion.
    Default,
}

impl ConversionTime {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Fast => 0x1A,
            Self::Default => 0x3A,
        }
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x1A => Some(Self::Fast),
            0x3A => Some(Self::Default),
            _ => None,
        }
    }
}

/// Factory calibration words read back at configure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub offset: [u8; 2],
    pub gain: [u8; 2],
}

/// One 6-byte result block: capacitance then internal temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub capacitance: [u8; 3],
    pub chip_temperature: [u8; 3],
}

impl Sample {
    pub fn capacitance_code(&self) -> u32 {
        crate::protocol::frame::u24_from_be(self.capacitance)
    }

    pub fn picofarads(&self) -> f64 {
        raw_to_picofarads(self.capacitance_code())
    }
}

/// 24-bit offset-binary code to pF.
pub fn raw_to_picofarads(code: u32) -> f64 {
    -OFFSET_PF + code as f64 * SPAN_PF / CODES
}

/// pF back to a 24-bit code, saturating at the ends of the range.
pub fn picofarads_to_raw(pf: f64) -> u32 {
    let code = (pf + OFFSET_PF) * CODES / SPAN_PF;
    if code <= 0.0 {
        0
    } else if code >= MAX_CODE as f64 {
        MAX_CODE
    } else {
        code as u32
    }
}

/// Capacitance-to-digital converter (AD7746 register map).
pub struct Ad7746 {
    settle_ms: u32,
}

impl Ad7746 {
    pub fn new(settle_ms: u32) -> Self {
        Self { settle_ms }
    }

    /// Selects the differential input, enables the internal temperature
    /// channel and excitation, programs `conversion` and reads back the
    /// factory calibration.
    pub async fn configure<B: I2c, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        conversion: ConversionTime,
    ) -> Result<Calibration, Error> {
        delay.delay_ms(self.settle_ms).await;
        write_reg(bus, REG_CAP_SETUP, CapMode::Differential.bits())
            .await
            .during(Device::Capacitance, "select default capacitors")?;

        delay.delay_ms(self.settle_ms).await;
        write_reg(bus, REG_VT_SETUP, VT_SETUP_INT_TEMP)
            .await
            .during(Device::Capacitance, "enable temperature channel")?;

        delay.delay_ms(self.settle_ms).await;
        write_reg(bus, REG_EXC_SETUP, EXC_SETUP_A)
            .await
            .during(Device::Capacitance, "configure excitation")?;

        delay.delay_ms(self.settle_ms).await;
        write_reg(bus, REG_CONFIG, conversion.bits())
            .await
            .during(Device::Capacitance, "set conversion time")?;

        delay.delay_ms(self.settle_ms).await;
        let mut buf = [0u8; 4];
        bus.write_read(ADDR, &[REG_CAP_OFFSET_H], &mut buf)
            .await
            .during(Device::Capacitance, "read calibration")?;

        Ok(Calibration {
            offset: [buf[0], buf[1]],
            gain: [buf[2], buf[3]],
        })
    }

    /// Selects `mode` and starts a single capacitance conversion.
    pub async fn trigger_capacitance<B: I2c>(
        &mut self,
        bus: &mut B,
        mode: CapMode,
        conversion: ConversionTime,
    ) -> Result<(), Error> {
        write_reg(bus, REG_CAP_SETUP, mode.bits())
            .await
            .during(Device::Capacitance, "select capacitors")?;
        write_reg(bus, REG_CONFIG, conversion.bits())
            .await
            .during(Device::Capacitance, "start capacitance conversion")
    }

    /// Starts a single internal-temperature conversion.
    pub async fn trigger_temperature<B: I2c>(&mut self, bus: &mut B) -> Result<(), Error> {
        write_reg(bus, REG_CONFIG, TEMPERATURE_CONVERSION)
            .await
            .during(Device::Capacitance, "start temperature conversion")
    }

    /// Reads the result registers of the last completed conversion.
    pub async fn read<B: I2c>(&mut self, bus: &mut B) -> Result<Sample, Error> {
        let mut buf = [0u8; 6];
        bus.write_read(ADDR, &[REG_DATA], &mut buf)
            .await
            .during(Device::Capacitance, "read result")?;
        Ok(Sample {
            capacitance: [buf[0], buf[1], buf[2]],
            chip_temperature: [buf[3], buf[4], buf[5]],
        })
    }
}

async fn write_reg<B: I2c>(bus: &mut B, reg: u8, val: u8) -> Result<(), B::Error> {
    bus.write(ADDR, &[reg, val]).await
}
