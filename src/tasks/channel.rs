//! Per-channel acquisition state machine.
//!
//! ```text
//! PowerOnReset → Init → {InitFailed → InitFailedWait → Init}* → Start → Running
//! Running → RunFailed → RunFailedWait → Init
//! ```
//!
//! One [`Channel`] owns its bus and runs forever in its own task. It shares
//! nothing with the other channels except the telemetry frame (under its
//! mutex) and the parameter atomics in [`Hub`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::ChannelConfig;
use crate::drivers::ad7746::{self, Ad7746, CapMode, Sample};
use crate::drivers::filter::CapacitanceFilter;
use crate::drivers::hdc1080::Hdc1080;
use crate::drivers::pca9536::{Pca9536, RelayPosition};
use crate::error::Error;
use crate::protocol::frame::u24_to_be;
use crate::state::Hub;
use crate::CHANNEL_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    PowerOnReset,
    Init,
    InitFailed,
    InitFailedWait,
    Start,
    Running,
    RunFailed,
    RunFailedWait,
}

pub struct Channel<'a, B, D, M: RawMutex> {
    index: usize,
    bus: B,
    delay: D,
    hub: &'a Hub<M>,
    config: ChannelConfig,

    state: State,
    wait_ms: u32,
    since_completion_ms: u32,
    since_climate_ms: u32,

    mode: CapMode,
    prev_mode: CapMode,
    cap_reads: u32,
    discard_next: bool,
    temperature_pending: bool,
    climate_ready: bool,

    filter: CapacitanceFilter,
    cap: Ad7746,
    climate: Hdc1080,
    relay: Pca9536,
}

impl<'a, B: I2c, D: DelayNs, M: RawMutex> Channel<'a, B, D, M> {
    /// # Panics
    ///
    /// If `index` is not below [`CHANNEL_COUNT`].
    pub fn new(index: usize, bus: B, delay: D, hub: &'a Hub<M>, config: ChannelConfig) -> Self {
        assert!(index < CHANNEL_COUNT, "channel index out of range");
        Self {
            index,
            bus,
            delay,
            hub,
            state: State::PowerOnReset,
            wait_ms: 0,
            since_completion_ms: 0,
            since_climate_ms: 0,
            mode: CapMode::Differential,
            prev_mode: CapMode::Differential,
            cap_reads: 0,
            discard_next: false,
            temperature_pending: false,
            climate_ready: false,
            filter: CapacitanceFilter::new(),
            cap: Ad7746::new(config.setup_settle_ms),
            climate: Hdc1080::new(config.setup_settle_ms),
            relay: Pca9536::new(config.setup_settle_ms, config.relay_hold_ms),
            config,
        }
    }

    pub async fn run(mut self) -> ! {
        loop {
            self.step().await;
        }
    }

    /// Executes one scheduling quantum, ending with a tick-long pause.
    pub async fn step(&mut self) {
        match self.state {
            State::PowerOnReset => self.power_on_reset().await,
            State::Init => self.init().await,
            State::InitFailed => self.arm_backoff(State::InitFailedWait),
            State::InitFailedWait | State::RunFailedWait => self.count_down(),
            State::Start => self.start().await,
            State::Running => self.running().await,
            State::RunFailed => self.run_failed().await,
        }
        self.pause(self.config.tick_ms).await;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Capacitance mode of the conversion currently in flight.
    pub fn mode(&self) -> CapMode {
        self.mode
    }

    pub fn climate_ready(&self) -> bool {
        self.climate_ready
    }

    pub fn since_completion_ms(&self) -> u32 {
        self.since_completion_ms
    }

    pub fn filter(&self) -> &CapacitanceFilter {
        &self.filter
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    // ── States ────────────────────────────────────────────────────────────────

    async fn power_on_reset(&mut self) {
        info!("({}) bus up", self.index);
        self.hub.telemetry.write_header().await;
        self.state = State::Init;
    }

    async fn init(&mut self) {
        let ch = self.index;

        if let Err(e) = self.relay.configure(&mut self.bus, &mut self.delay).await {
            warn!("({}) init failed: {}", ch, e);
            self.state = State::InitFailed;
            return;
        }

        let conversion = self.hub.params.conversion_time();
        match self.cap.configure(&mut self.bus, &mut self.delay, conversion).await {
            Ok(cal) => info!(
                "({}) calibration offset {:?} gain {:?}",
                ch, cal.offset, cal.gain
            ),
            Err(e) => {
                warn!("({}) init failed: {}", ch, e);
                self.state = State::InitFailed;
                return;
            }
        }

        self.climate_ready = self
            .climate
            .configure(&mut self.bus, &mut self.delay, true)
            .await
            .is_ok();
        if !self.climate_ready {
            warn!("({}) continuing without humidity/temperature sensor", ch);
        }

        info!("({}) init successful", ch);
        self.state = State::Start;
        self.delay.delay_ms(self.config.init_settle_ms).await;
    }

    fn arm_backoff(&mut self, next: State) {
        self.wait_ms = self.config.retry_backoff_ms;
        self.state = next;
    }

    fn count_down(&mut self) {
        self.wait_ms = self.wait_ms.saturating_sub(self.config.tick_ms);
        if self.wait_ms == 0 {
            self.state = State::Init;
        }
    }

    async fn start(&mut self) {
        let ch = self.index;
        let hub = self.hub;
        let completions = &hub.completions;

        self.mode = CapMode::Differential;
        self.prev_mode = self.mode;
        // Stops any free-running conversion; the result does not matter.
        let _ = self
            .cap
            .trigger_capacitance(&mut self.bus, self.mode, hub.params.conversion_time())
            .await;

        completions.disable(ch);
        completions.clear(ch);
        self.pause(self.config.start_settle_ms).await;
        completions.enable(ch);

        self.since_completion_ms = 0;
        self.since_climate_ms = 0;
        self.cap_reads = 0;
        self.temperature_pending = false;
        // The first result after a restart is whatever the converter held.
        self.discard_next = true;
        self.state = State::Running;
        completions.force(ch);
    }

    async fn running(&mut self) {
        let ch = self.index;

        if let Some(pos) = self.hub.params.take_relay_request(ch) {
            self.switch_relay(pos).await;
        }

        if self.since_completion_ms > self.config.completion_timeout_ms {
            let e = Error::CompletionTimeout {
                elapsed_ms: self.since_completion_ms,
            };
            error!("({}) {}, re-initializing", ch, e);
            self.state = State::RunFailed;
            return;
        }

        if !self.hub.completions.take(ch) {
            return;
        }
        if let Err(e) = self.service_completion().await {
            error!("({}) {}, re-initializing", ch, e);
            self.state = State::RunFailed;
        }
    }

    async fn run_failed(&mut self) {
        let ch = self.index;
        self.hub.completions.disable(ch);
        self.hub.completions.clear(ch);
        self.hub.telemetry.clear_channel(ch).await;
        self.arm_backoff(State::RunFailedWait);
    }

    // ── Running helpers ───────────────────────────────────────────────────────

    /// Reads the conversion that just completed and starts the next one.
    ///
    /// The mode selector advances before the read: `prev_mode` names the
    /// result being read, `mode` the conversion triggered next.
    async fn service_completion(&mut self) -> Result<(), Error> {
        let ch = self.index;
        let hub = self.hub;
        let io_gap = self.config.io_gap_ms;

        self.since_completion_ms = 0;
        self.prev_mode = self.mode;
        self.mode = self.mode.next(hub.params.full_set(ch));

        hub.completions.disable(ch);
        self.pause(io_gap).await;

        let sample = self.cap.read(&mut self.bus).await?;
        if self.discard_next {
            self.discard_next = false;
            self.temperature_pending = false;
            trace!("({}) discarded start-up result", ch);
        } else if self.temperature_pending {
            self.temperature_pending = false;
            hub.telemetry
                .update(ch, |block| block.chip_temperature = sample.chip_temperature)
                .await;
        } else {
            self.record(self.prev_mode, &sample).await;
        }
        self.pause(io_gap).await;

        if self.since_climate_ms > self.config.climate_period_ms {
            self.service_climate().await;
        }

        hub.completions.clear(ch);
        hub.completions.enable(ch);

        self.cap_reads = self.cap_reads.wrapping_add(1);
        let interval = self.config.temperature_interval;
        if interval > 0 && self.cap_reads % interval == 0 {
            self.cap.trigger_temperature(&mut self.bus).await?;
            // The capacitance registers keep the last result while the chip
            // temperature converts, so the next read refreshes only that.
            self.mode = self.prev_mode;
            self.temperature_pending = true;
        } else {
            self.cap
                .trigger_capacitance(&mut self.bus, self.mode, hub.params.conversion_time())
                .await?;
        }

        self.pause(io_gap).await;
        Ok(())
    }

    async fn record(&mut self, mode: CapMode, sample: &Sample) {
        let filtered = match mode {
            CapMode::Differential => {
                let pf = self.filter.filter(sample.picofarads());
                Some(u24_to_be(ad7746::picofarads_to_raw(pf)))
            }
            CapMode::C1 | CapMode::C2 => None,
        };

        self.hub
            .telemetry
            .update(self.index, |block| {
                match mode {
                    CapMode::Differential => block.differential = sample.capacitance,
                    CapMode::C1 => block.c1 = sample.capacitance,
                    CapMode::C2 => block.c2 = sample.capacitance,
                }
                if let Some(f) = filtered {
                    block.filtered = f;
                }
                block.chip_temperature = sample.chip_temperature;
            })
            .await;
    }

    async fn service_climate(&mut self) {
        let ch = self.index;
        self.since_climate_ms = 0;

        if !self.climate_ready {
            if self
                .climate
                .configure(&mut self.bus, &mut self.delay, false)
                .await
                .is_ok()
            {
                self.climate_ready = true;
                info!("({}) humidity/temperature sensor reconnected", ch);
            }
            return;
        }

        match self.climate.read(&mut self.bus).await {
            Ok(s) => {
                debug!(
                    "({}) {} degC {} %RH",
                    ch,
                    s.celsius(),
                    s.relative_humidity()
                );
                self.hub
                    .telemetry
                    .update(ch, |block| {
                        block.temperature = s.temperature;
                        block.humidity = s.humidity;
                    })
                    .await;
            }
            Err(e) => {
                self.climate_ready = false;
                warn!("({}) humidity/temperature sensor disconnected: {}", ch, e);
                self.hub.telemetry.clear_climate(ch).await;
            }
        }
    }

    async fn switch_relay(&mut self, pos: RelayPosition) {
        let ch = self.index;
        self.delay.delay_ms(self.config.relay_pre_switch_ms).await;
        match self
            .relay
            .set_position(&mut self.bus, &mut self.delay, pos, &self.hub.relay_indicator)
            .await
        {
            Ok(()) => debug!("({}) relay switched to {:?}", ch, pos),
            Err(e) => warn!("({}) relay switch to {:?} failed: {}", ch, pos, e),
        }
        self.delay.delay_ms(self.config.relay_post_switch_ms).await;
    }

    /// Sleeps and advances the completion and climate timers.
    async fn pause(&mut self, ms: u32) {
        self.delay.delay_ms(ms).await;
        self.since_completion_ms = self.since_completion_ms.saturating_add(ms);
        self.since_climate_ms = self.since_climate_ms.saturating_add(ms);
    }
}
