use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};
use embassy_stm32::Config;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        // Default clock tree (MSIS 4 MHz) is plenty for 100 kHz I2C and the
        // upstream UART.
        let config = Config::default();
        let p = embassy_stm32::init(config);

        Self { p }
    }
}

/// Status LEDs: a heartbeat and a mirror of the relay position indicator.
pub struct Leds {
    heartbeat: Output<'static, AnyPin>,
    relay: Output<'static, AnyPin>,
}

impl Leds {
    pub fn new(heartbeat: AnyPin, relay: AnyPin) -> Self {
        Self {
            heartbeat: Output::new(heartbeat, Level::Low, Speed::Low),
            relay: Output::new(relay, Level::Low, Speed::Low),
        }
    }

    /// Lights everything once bring-up is complete.
    pub fn all_on(&mut self) {
        self.heartbeat.set_high();
        self.relay.set_high();
    }

    pub fn toggle_heartbeat(&mut self) {
        self.heartbeat.toggle();
    }

    pub fn show_relay(&mut self, new_position: bool) {
        if new_position {
            self.relay.set_high();
        } else {
            self.relay.set_low();
        }
    }
}
