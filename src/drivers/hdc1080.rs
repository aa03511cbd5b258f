use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::error::{BusResultExt, Device, Error};

const ADDR: u8 = 0x40;

const REG_CONFIG: u8 = 0x02;
// Pointer write that starts a temperature + humidity conversion.
const TRIGGER_BOTH: u8 = 0x00;
// MODE = 1: temperature then humidity, 14-bit each, heater off.
const CONFIG_T_AND_H: u16 = 0b0001_0000_0000_0000;

/// Raw temperature and humidity words as read from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClimateSample {
    pub temperature: [u8; 2],
    pub humidity: [u8; 2],
}

impl ClimateSample {
    pub fn celsius(&self) -> f32 {
        u16::from_be_bytes(self.temperature) as f32 / 65536.0 * 165.0 - 40.0
    }

    pub fn relative_humidity(&self) -> f32 {
        u16::from_be_bytes(self.humidity) as f32 / 65536.0 * 100.0
    }
}

/// Humidity and temperature sensor (HDC1080 register map).
pub struct Hdc1080 {
    settle_ms: u32,
}

impl Hdc1080 {
    pub fn new(settle_ms: u32) -> Self {
        Self { settle_ms }
    }

    /// Selects sequential temperature + humidity mode and triggers the
    /// first conversion.
    ///
    /// `report_failure` is false for the periodic re-probe of a sensor
    /// that may simply be unplugged; a failed mode write is then quiet.
    pub async fn configure<B: I2c, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        report_failure: bool,
    ) -> Result<(), Error> {
        delay.delay_ms(self.settle_ms).await;
        let [hi, lo] = CONFIG_T_AND_H.to_be_bytes();
        if let Err(e) = bus
            .write(ADDR, &[REG_CONFIG, hi, lo])
            .await
            .during(Device::Climate, "write configuration")
        {
            if report_failure {
                warn!("climate setup failed: {:?}", e);
            }
            return Err(e);
        }

        delay.delay_ms(self.settle_ms).await;
        self.trigger(bus).await
    }

    /// Reads the last conversion and starts the next one.
    pub async fn read<B: I2c>(&mut self, bus: &mut B) -> Result<ClimateSample, Error> {
        let mut buf = [0u8; 4];
        bus.read(ADDR, &mut buf)
            .await
            .during(Device::Climate, "read result")?;
        let sample = ClimateSample {
            temperature: [buf[0], buf[1]],
            humidity: [buf[2], buf[3]],
        };
        self.trigger(bus).await?;
        Ok(sample)
    }

    async fn trigger<B: I2c>(&mut self, bus: &mut B) -> Result<(), Error> {
        bus.write(ADDR, &[TRIGGER_BOTH])
            .await
            .during(Device::Climate, "trigger conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_engineering_units() {
        let s = ClimateSample {
            temperature: [0x66, 0x66],
            humidity: [0x80, 0x00],
        };
        assert!((s.celsius() - 25.99).abs() < 0.01);
        assert!((s.relative_humidity() - 50.0).abs() < 1e-4);

        let zero = ClimateSample {
            temperature: [0, 0],
            humidity: [0, 0],
        };
        assert_eq!(zero.celsius(), -40.0);
        assert_eq!(zero.relative_humidity(), 0.0);
    }
}
