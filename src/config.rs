//! Timing and cadence parameters.
//!
//! Settle delays are relay and converter requirements; keep them even where
//! they look generous.

/// Scheduling quantum of a channel task.
pub const TICK_MS: u32 = 1;

#[cfg(not(feature = "debug-timeouts"))]
pub const COMPLETION_TIMEOUT_MS: u32 = 1000;
#[cfg(feature = "debug-timeouts")]
pub const COMPLETION_TIMEOUT_MS: u32 = 250;

#[cfg(not(feature = "debug-timeouts"))]
pub const RETRY_BACKOFF_MS: u32 = 1000;
#[cfg(feature = "debug-timeouts")]
pub const RETRY_BACKOFF_MS: u32 = 250;

/// Minimum spacing between humidity/temperature reads.
pub const CLIMATE_PERIOD_MS: u32 = 1000;
/// Every Nth capacitance read triggers a chip-temperature conversion instead.
pub const TEMPERATURE_INTERVAL: u32 = 10;

pub const SETUP_SETTLE_MS: u32 = 100;
pub const INIT_SETTLE_MS: u32 = 100;
pub const START_SETTLE_MS: u32 = 5;
pub const IO_GAP_MS: u32 = 1;

pub const RELAY_PRE_SWITCH_MS: u32 = 500;
pub const RELAY_HOLD_MS: u32 = 100;
pub const RELAY_POST_SWITCH_MS: u32 = 100;

/// Gives the channels time to come up before the first upstream exchange.
pub const TRANSPORT_STARTUP_DELAY_MS: u32 = 5000;
/// Pause after a failed link exchange.
pub const TRANSPORT_ERROR_BACKOFF_MS: u32 = 1;

/// Per-channel acquisition parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub tick_ms: u32,
    pub retry_backoff_ms: u32,
    pub completion_timeout_ms: u32,
    pub climate_period_ms: u32,
    pub temperature_interval: u32,
    pub setup_settle_ms: u32,
    pub init_settle_ms: u32,
    pub start_settle_ms: u32,
    pub io_gap_ms: u32,
    pub relay_pre_switch_ms: u32,
    pub relay_hold_ms: u32,
    pub relay_post_switch_ms: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            completion_timeout_ms: COMPLETION_TIMEOUT_MS,
            climate_period_ms: CLIMATE_PERIOD_MS,
            temperature_interval: TEMPERATURE_INTERVAL,
            setup_settle_ms: SETUP_SETTLE_MS,
            init_settle_ms: INIT_SETTLE_MS,
            start_settle_ms: START_SETTLE_MS,
            io_gap_ms: IO_GAP_MS,
            relay_pre_switch_ms: RELAY_PRE_SWITCH_MS,
            relay_hold_ms: RELAY_HOLD_MS,
            relay_post_switch_ms: RELAY_POST_SWITCH_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportConfig {
    pub startup_delay_ms: u32,
    pub error_backoff_ms: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: TRANSPORT_STARTUP_DELAY_MS,
            error_backoff_ms: TRANSPORT_ERROR_BACKOFF_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = ChannelConfig::default();
        assert!(c.tick_ms > 0);
        assert!(c.temperature_interval > 1);
        assert!(c.retry_backoff_ms >= c.tick_ms);
    }

    #[test]
    fn relay_settling_fits_inside_the_completion_timeout() {
        // A relay switch happens between two completion checks and must not
        // by itself look like a stalled converter.
        let c = ChannelConfig::default();
        assert!(c.relay_hold_ms + c.relay_post_switch_ms < c.completion_timeout_ms);
    }
}
