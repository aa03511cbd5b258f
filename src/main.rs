#![no_std]
#![no_main]

mod board;

use embassy_executor::Spawner;
use embassy_stm32::exti::{Channel as _, ExtiInput};
use embassy_stm32::gpio::{AnyPin, Input, Pin, Pull};
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{self, Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, i2c, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use sensor_hub::config::{ChannelConfig, TransportConfig};
use sensor_hub::protocol::FRAME_LEN;
use sensor_hub::state::Hub;
use sensor_hub::tasks::{Channel, Link, Transport};

use crate::board::{Board, Leds};

// ── Shared state ──────────────────────────────────────────────────────────────
static HUB: Hub<CriticalSectionRawMutex> = Hub::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    I2C1_EV => i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => i2c::ErrorInterruptHandler<peripherals::I2C1>;
    I2C2_EV => i2c::EventInterruptHandler<peripherals::I2C2>;
    I2C2_ER => i2c::ErrorInterruptHandler<peripherals::I2C2>;
    I2C3_EV => i2c::EventInterruptHandler<peripherals::I2C3>;
    I2C3_ER => i2c::ErrorInterruptHandler<peripherals::I2C3>;
    I2C4_EV => i2c::EventInterruptHandler<peripherals::I2C4>;
    I2C4_ER => i2c::ErrorInterruptHandler<peripherals::I2C4>;
    I2C5_EV => i2c::EventInterruptHandler<peripherals::I2C5>;
    I2C5_ER => i2c::ErrorInterruptHandler<peripherals::I2C5>;
    I2C6_EV => i2c::EventInterruptHandler<peripherals::I2C6>;
    I2C6_ER => i2c::ErrorInterruptHandler<peripherals::I2C6>;
    USART1  => usart::InterruptHandler<peripherals::USART1>;
});

// ── Channel tasks ─────────────────────────────────────────────────────────────
// Tasks cannot be generic, so each bus type gets its own thin wrapper.
macro_rules! channel_task {
    ($name:ident, $i2c:ident, $tx:ident, $rx:ident) => {
        #[embassy_executor::task]
        async fn $name(index: usize, bus: I2c<'static, $i2c, $tx, $rx>) {
            Channel::new(index, bus, Delay, &HUB, ChannelConfig::default())
                .run()
                .await
        }
    };
}

channel_task!(channel0_task, I2C1, GPDMA1_CH2, GPDMA1_CH3);
channel_task!(channel1_task, I2C2, GPDMA1_CH4, GPDMA1_CH5);
channel_task!(channel2_task, I2C3, GPDMA1_CH6, GPDMA1_CH7);
channel_task!(channel3_task, I2C4, GPDMA1_CH8, GPDMA1_CH9);
channel_task!(channel4_task, I2C5, GPDMA1_CH10, GPDMA1_CH11);
channel_task!(channel5_task, I2C6, GPDMA1_CH12, GPDMA1_CH13);

/// Forwards the converter's active-low RDY edge into the completion bridge.
#[embassy_executor::task(pool_size = 6)]
async fn completion_task(index: usize, mut line: ExtiInput<'static, AnyPin>) {
    loop {
        line.wait_for_falling_edge().await;
        HUB.completions.signal(index);
    }
}

// ── Upstream link ─────────────────────────────────────────────────────────────
struct UartLink {
    uart: Uart<'static, USART1, GPDMA1_CH0, GPDMA1_CH1>,
}

impl Link for UartLink {
    type Error = usart::Error;

    async fn exchange(
        &mut self,
        outbound: &[u8; FRAME_LEN],
        inbound: &mut [u8; FRAME_LEN],
    ) -> Result<(), usart::Error> {
        self.uart.write(outbound).await?;
        self.uart.read(inbound).await
    }
}

#[embassy_executor::task]
async fn transport_task(link: UartLink) {
    Transport::new(link, &HUB)
        .run(Delay, TransportConfig::default())
        .await
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init
    let board = Board::init();
    let p = board.p;

    // 2. Zeroed frame, default parameters, completion lines disabled
    HUB.reset().await;

    // 3. Status LEDs (PC7 heartbeat, PG2 relay position)
    let mut leds = Leds::new(p.PC7.degrade(), p.PG2.degrade());

    // 4. Conversion-complete lines, one EXTI per channel (PE0..PE5)
    let lines = [
        ExtiInput::new(Input::new(p.PE0.degrade(), Pull::Up), p.EXTI0.degrade()),
        ExtiInput::new(Input::new(p.PE1.degrade(), Pull::Up), p.EXTI1.degrade()),
        ExtiInput::new(Input::new(p.PE2.degrade(), Pull::Up), p.EXTI2.degrade()),
        ExtiInput::new(Input::new(p.PE3.degrade(), Pull::Up), p.EXTI3.degrade()),
        ExtiInput::new(Input::new(p.PE4.degrade(), Pull::Up), p.EXTI4.degrade()),
        ExtiInput::new(Input::new(p.PE5.degrade(), Pull::Up), p.EXTI5.degrade()),
    ];
    for (index, line) in lines.into_iter().enumerate() {
        spawner.spawn(completion_task(index, line)).unwrap();
    }

    // 5. One I2C controller per channel @ 100 kHz
    let freq = TimeHertz(100_000);
    let bus0 = I2c::new(p.I2C1, p.PB6, p.PB7, Irqs, p.GPDMA1_CH2, p.GPDMA1_CH3, freq, Default::default());
    let bus1 = I2c::new(p.I2C2, p.PF1, p.PF0, Irqs, p.GPDMA1_CH4, p.GPDMA1_CH5, freq, Default::default());
    let bus2 = I2c::new(p.I2C3, p.PC0, p.PC1, Irqs, p.GPDMA1_CH6, p.GPDMA1_CH7, freq, Default::default());
    let bus3 = I2c::new(p.I2C4, p.PD12, p.PD13, Irqs, p.GPDMA1_CH8, p.GPDMA1_CH9, freq, Default::default());
    let bus4 = I2c::new(p.I2C5, p.PD1, p.PD0, Irqs, p.GPDMA1_CH10, p.GPDMA1_CH11, freq, Default::default());
    let bus5 = I2c::new(p.I2C6, p.PF14, p.PF15, Irqs, p.GPDMA1_CH12, p.GPDMA1_CH13, freq, Default::default());

    // Failing to start any channel is fatal.
    spawner.spawn(channel0_task(0, bus0)).unwrap();
    spawner.spawn(channel1_task(1, bus1)).unwrap();
    spawner.spawn(channel2_task(2, bus2)).unwrap();
    spawner.spawn(channel3_task(3, bus3)).unwrap();
    spawner.spawn(channel4_task(4, bus4)).unwrap();
    spawner.spawn(channel5_task(5, bus5)).unwrap();

    // 6. Upstream USART1 @ 115200 (TX=PA9, RX=PA10)
    let mut link_config = UsartConfig::default();
    link_config.baudrate = 115_200;
    let uart = Uart::new(
        p.USART1, p.PA10, p.PA9,
        Irqs,
        p.GPDMA1_CH0, p.GPDMA1_CH1,
        link_config,
    ).unwrap();
    spawner.spawn(transport_task(UartLink { uart })).unwrap();

    defmt::info!("bring-up done");
    leds.all_on();
    Timer::after(Duration::from_millis(500)).await;

    // 7. Main task: heartbeat @ 1 Hz, relay LED follows the indicator
    loop {
        leds.toggle_heartbeat();
        leds.show_relay(HUB.relay_indicator.is_on());
        Timer::after(Duration::from_millis(500)).await;
    }
}
