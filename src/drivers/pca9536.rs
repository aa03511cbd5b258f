use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::error::{BusResultExt, Device, Error};
use crate::state::Indicator;

const ADDR: u8 = 0x41;

const REG_OUTPUT: u8 = 0x01;
const REG_CONFIG: u8 = 0x03;

const OUTPUT_IDLE: u8 = 0x00;
const CONFIG_ALL_OUTPUTS: u8 = 0x00;

/// The two latched positions of a channel relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayPosition {
    Old,
    New,
}

impl RelayPosition {
    /// Output-port pattern that drives the coil towards this position.
    pub const fn pattern(self) -> u8 {
        match self {
            Self::Old => 0x0A,
            Self::New => 0x05,
        }
    }
}

/// Latching relay driven through a 4-bit I/O expander (PCA9536 register map).
pub struct Pca9536 {
    settle_ms: u32,
    hold_ms: u32,
}

impl Pca9536 {
    pub fn new(settle_ms: u32, hold_ms: u32) -> Self {
        Self { settle_ms, hold_ms }
    }

    /// Idles the outputs, makes every pin an output and pulses the relay to
    /// the new position once.
    pub async fn configure<B: I2c, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
    ) -> Result<(), Error> {
        write_reg(bus, REG_OUTPUT, OUTPUT_IDLE)
            .await
            .during(Device::Relay, "reset outputs")?;
        delay.delay_ms(self.settle_ms).await;

        write_reg(bus, REG_CONFIG, CONFIG_ALL_OUTPUTS)
            .await
            .during(Device::Relay, "configure outputs")?;
        delay.delay_ms(self.settle_ms).await;

        write_reg(bus, REG_OUTPUT, RelayPosition::New.pattern())
            .await
            .during(Device::Relay, "init pulse")?;
        delay.delay_ms(self.settle_ms).await;

        write_reg(bus, REG_OUTPUT, OUTPUT_IDLE)
            .await
            .during(Device::Relay, "release init pulse")
    }

    /// Pulses the coil towards `pos`, holds, then idles the outputs.
    ///
    /// `indicator` follows the commanded position (on = new) as soon as the
    /// pulse has been written.
    pub async fn set_position<B: I2c, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        pos: RelayPosition,
        indicator: &Indicator,
    ) -> Result<(), Error> {
        write_reg(bus, REG_OUTPUT, pos.pattern())
            .await
            .during(Device::Relay, "switch pulse")?;
        indicator.set(pos == RelayPosition::New);

        delay.delay_ms(self.hold_ms).await;
        write_reg(bus, REG_OUTPUT, OUTPUT_IDLE)
            .await
            .during(Device::Relay, "release switch pulse")
    }
}

async fn write_reg<B: I2c>(bus: &mut B, reg: u8, val: u8) -> Result<(), B::Error> {
    bus.write(ADDR, &[reg, val]).await
}
