//! State shared between the channel tasks, the transport task and the
//! completion interrupts.
//!
//! The telemetry frame is the only mutex-protected resource. Everything the
//! command decoder writes for the channels to poll is a plain atomic behind
//! [`AcquisitionParams`].

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::drivers::ad7746::ConversionTime;
use crate::drivers::pca9536::RelayPosition;
use crate::irq::CompletionBridge;
use crate::protocol::frame::{ChannelBlock, TelemetryFrame, FRAME_LEN};
use crate::CHANNEL_COUNT;

// ── Acquisition parameters ───────────────────────────────────────────────────

/// Process-wide acquisition settings.
///
/// Written only by the command decoder, read by the channel tasks without
/// locking. Each field is a single byte or flag with no cross-field
/// consistency requirement.
pub struct AcquisitionParams {
    conversion_time: AtomicU8,
    full_set: [AtomicBool; CHANNEL_COUNT],
    relay_pending: [AtomicBool; CHANNEL_COUNT],
    relay_new: [AtomicBool; CHANNEL_COUNT],
}

impl AcquisitionParams {
    pub const fn new() -> Self {
        Self {
            conversion_time: AtomicU8::new(ConversionTime::Default.bits()),
            full_set: [const { AtomicBool::new(false) }; CHANNEL_COUNT],
            relay_pending: [const { AtomicBool::new(false) }; CHANNEL_COUNT],
            relay_new: [const { AtomicBool::new(false) }; CHANNEL_COUNT],
        }
    }

    pub fn conversion_time(&self) -> ConversionTime {
        ConversionTime::from_bits(self.conversion_time.load(Ordering::Relaxed))
            .unwrap_or(ConversionTime::Default)
    }

    pub fn set_conversion_time(&self, t: ConversionTime) {
        self.conversion_time.store(t.bits(), Ordering::Relaxed);
    }

    /// Whether `channel` reports C1 and C2 alongside the differential value.
    pub fn full_set(&self, channel: usize) -> bool {
        self.full_set[channel].load(Ordering::Relaxed)
    }

    pub fn set_full_set(&self, channel: usize, enabled: bool) {
        self.full_set[channel].store(enabled, Ordering::Relaxed);
    }

    /// Queues a relay switch for `channel`; a newer request replaces an
    /// unconsumed one.
    pub fn request_relay(&self, channel: usize, pos: RelayPosition) {
        self.relay_new[channel].store(pos == RelayPosition::New, Ordering::Relaxed);
        self.relay_pending[channel].store(true, Ordering::Release);
    }

    /// Consumes the pending relay request for `channel`, if any.
    pub fn take_relay_request(&self, channel: usize) -> Option<RelayPosition> {
        if !self.relay_pending[channel].swap(false, Ordering::Acquire) {
            return None;
        }
        if self.relay_new[channel].load(Ordering::Relaxed) {
            Some(RelayPosition::New)
        } else {
            Some(RelayPosition::Old)
        }
    }

    pub fn relay_pending(&self, channel: usize) -> bool {
        self.relay_pending[channel].load(Ordering::Acquire)
    }

    /// Default conversion time, differential-only everywhere, no relay
    /// requests.
    pub fn reset(&self) {
        self.set_conversion_time(ConversionTime::Default);
        for ch in 0..CHANNEL_COUNT {
            self.full_set[ch].store(false, Ordering::Relaxed);
            self.relay_new[ch].store(false, Ordering::Relaxed);
            self.relay_pending[ch].store(false, Ordering::Release);
        }
    }
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self::new()
    }
}

/// On/off status flag mirrored onto an LED by the board.
pub struct Indicator(AtomicBool);

impl Indicator {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Indicator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Telemetry frame ──────────────────────────────────────────────────────────

/// The telemetry frame behind its mutex.
///
/// Every accessor takes the lock for a pure memory copy only; no bus I/O ever
/// happens while it is held.
pub struct SharedTelemetry<M: RawMutex> {
    frame: Mutex<M, TelemetryFrame>,
}

impl<M: RawMutex> SharedTelemetry<M> {
    pub const fn new() -> Self {
        Self {
            frame: Mutex::new(TelemetryFrame::new()),
        }
    }

    pub async fn write_header(&self) {
        self.frame.lock().await.write_header();
    }

    /// Runs `f` on one channel block under the lock.
    pub async fn update<R>(&self, channel: usize, f: impl FnOnce(&mut ChannelBlock) -> R) -> R {
        let mut frame = self.frame.lock().await;
        f(&mut frame.channels[channel])
    }

    /// Zeroes one channel block and restores the header.
    pub async fn clear_channel(&self, channel: usize) {
        self.frame.lock().await.clear_channel(channel);
    }

    pub async fn clear_climate(&self, channel: usize) {
        self.frame.lock().await.channels[channel].clear_climate();
    }

    /// Serializes a consistent copy of the whole frame into `out`.
    pub async fn snapshot(&self, out: &mut [u8; FRAME_LEN]) {
        self.frame.lock().await.serialize(out);
    }

    pub async fn frame(&self) -> TelemetryFrame {
        *self.frame.lock().await
    }

    pub async fn reset(&self) {
        *self.frame.lock().await = TelemetryFrame::new();
    }
}

impl<M: RawMutex> Default for SharedTelemetry<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Hub ──────────────────────────────────────────────────────────────────────

/// Everything the seven tasks and the completion interrupts share.
pub struct Hub<M: RawMutex> {
    pub telemetry: SharedTelemetry<M>,
    pub params: AcquisitionParams,
    pub completions: CompletionBridge,
    pub relay_indicator: Indicator,
}

impl<M: RawMutex> Hub<M> {
    pub const fn new() -> Self {
        Self {
            telemetry: SharedTelemetry::new(),
            params: AcquisitionParams::new(),
            completions: CompletionBridge::new(),
            relay_indicator: Indicator::new(),
        }
    }

    /// Process-start state: zeroed frame, default parameters, every
    /// completion line disabled and cleared.
    pub async fn reset(&self) {
        self.telemetry.reset().await;
        self.params.reset();
        self.completions.reset();
        self.relay_indicator.set(false);
    }
}

impl<M: RawMutex> Default for Hub<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn params_start_slow_and_differential_only() {
        let p = AcquisitionParams::new();
        assert_eq!(p.conversion_time(), ConversionTime::Default);
        assert!((0..CHANNEL_COUNT).all(|ch| !p.full_set(ch)));
        assert!((0..CHANNEL_COUNT).all(|ch| p.take_relay_request(ch).is_none()));
    }

    #[test]
    fn relay_request_is_consumed_once_and_latest_wins() {
        let p = AcquisitionParams::new();
        p.request_relay(1, RelayPosition::New);
        p.request_relay(1, RelayPosition::Old);
        assert!(p.relay_pending(1));
        assert_eq!(p.take_relay_request(1), Some(RelayPosition::Old));
        assert_eq!(p.take_relay_request(1), None);
    }

    #[test]
    fn reset_restores_defaults() {
        let p = AcquisitionParams::new();
        p.set_conversion_time(ConversionTime::Fast);
        p.set_full_set(5, true);
        p.request_relay(0, RelayPosition::New);
        p.reset();
        assert_eq!(p.conversion_time(), ConversionTime::Default);
        assert!(!p.full_set(5));
        assert!(!p.relay_pending(0));
    }

    #[test]
    fn clear_channel_leaves_other_blocks_alone() {
        let t = SharedTelemetry::<CriticalSectionRawMutex>::new();
        block_on(async {
            t.update(0, |b| b.c1 = [1, 1, 1]).await;
            t.update(3, |b| b.humidity = [2, 2]).await;
            t.clear_channel(3).await;

            let frame = t.frame().await;
            assert!(frame.has_valid_header());
            assert!(frame.channels[3].is_zero());
            assert_eq!(frame.channels[0].c1, [1, 1, 1]);
        });
    }

    #[test]
    fn hub_reset_zeroes_everything() {
        let hub = Hub::<CriticalSectionRawMutex>::new();
        block_on(async {
            hub.telemetry.write_header().await;
            hub.completions.enable(0);
            hub.relay_indicator.set(true);
            hub.reset().await;

            let mut bytes = [0xFF; FRAME_LEN];
            hub.telemetry.snapshot(&mut bytes).await;
            assert!(bytes.iter().all(|&b| b == 0));
            assert!(!hub.completions.is_enabled(0));
            assert!(!hub.relay_indicator.is_on());
        });
    }
}
