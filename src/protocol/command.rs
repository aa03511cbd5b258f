//! Inbound command frame and its decoder.
//!
//! Only the first four bytes of the 119-byte inbound frame carry meaning;
//! a zero first byte means "no command".
//!
//! | bytes       | command                                              |
//! |-------------|------------------------------------------------------|
//! | `1 1 0 _`   | all relays to the old position                       |
//! | `1 1 1 m`   | relays per bitmask `m` (bit i set = new, `m == 0` = all new) |
//! | `1 0 1 1`   | fast capacitance conversion time                     |
//! | `1 0 1 0`   | default (slow) capacitance conversion time           |
//! | `1 2 ch _`  | channel `ch` reports differential capacitance only   |
//! | `1 3 ch _`  | channel `ch` reports differential plus C1 and C2     |
//!
//! A channel index above 5 is clamped to 0.

use core::fmt;

use super::frame::FRAME_LEN;
use crate::drivers::ad7746::ConversionTime;
use crate::drivers::pca9536::RelayPosition;
use crate::state::AcquisitionParams;
use crate::CHANNEL_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Switch every channel's relay to the old position.
    AllRelaysOld,
    /// Switch every channel's relay; bit `i` set selects new for channel `i`.
    RelayMask(u8),
    SetConversionTime(ConversionTime),
    DifferentialOnly { channel: usize },
    FullCapacitanceSet { channel: usize },
}

/// Command bytes that match no known pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidCommand(pub [u8; 4]);

impl fmt::Display for InvalidCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "bad command: {a} {b} {c} {d}")
    }
}

impl Command {
    /// Decodes the leading command bytes.
    ///
    /// Returns `Ok(None)` when the first byte is zero (no command pending).
    pub fn decode(bytes: [u8; 4]) -> Result<Option<Self>, InvalidCommand> {
        let cmd = match bytes {
            [0, ..] => return Ok(None),
            [1, 1, 1, mask] => Self::RelayMask(mask),
            [1, 1, 0, _] => Self::AllRelaysOld,
            [1, 0, 1, 1] => Self::SetConversionTime(ConversionTime::Fast),
            [1, 0, 1, 0] => Self::SetConversionTime(ConversionTime::Default),
            [1, 2, ch, _] => Self::DifferentialOnly {
                channel: clamp_channel(ch),
            },
            [1, 3, ch, _] => Self::FullCapacitanceSet {
                channel: clamp_channel(ch),
            },
            _ => return Err(InvalidCommand(bytes)),
        };
        Ok(Some(cmd))
    }

    /// Requested relay position for `channel`, if this is a relay command.
    pub fn relay_target(&self, channel: usize) -> Option<RelayPosition> {
        match *self {
            Self::AllRelaysOld => Some(RelayPosition::Old),
            Self::RelayMask(0) => Some(RelayPosition::New),
            Self::RelayMask(mask) if mask & (1 << channel) != 0 => Some(RelayPosition::New),
            Self::RelayMask(_) => Some(RelayPosition::Old),
            _ => None,
        }
    }

    /// Publishes the command into the parameters the channel tasks poll.
    pub fn apply(&self, params: &AcquisitionParams) {
        match *self {
            Self::AllRelaysOld | Self::RelayMask(_) => {
                for channel in 0..CHANNEL_COUNT {
                    if let Some(pos) = self.relay_target(channel) {
                        params.request_relay(channel, pos);
                    }
                }
            }
            Self::SetConversionTime(t) => params.set_conversion_time(t),
            Self::DifferentialOnly { channel } => params.set_full_set(channel, false),
            Self::FullCapacitanceSet { channel } => params.set_full_set(channel, true),
        }
    }
}

fn clamp_channel(ch: u8) -> usize {
    let ch = ch as usize;
    if ch < CHANNEL_COUNT {
        ch
    } else {
        0
    }
}

/// Receive buffer for the inbound half of an exchange.
pub struct CommandFrame {
    buf: [u8; FRAME_LEN],
}

impl CommandFrame {
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_LEN],
        }
    }

    pub fn buffer_mut(&mut self) -> &mut [u8; FRAME_LEN] {
        &mut self.buf
    }

    pub fn is_pending(&self) -> bool {
        self.buf[0] != 0
    }

    pub fn command_bytes(&self) -> [u8; 4] {
        [self.buf[0], self.buf[1], self.buf[2], self.buf[3]]
    }

    /// Takes the pending command bytes and resets the frame to zero.
    pub fn take(&mut self) -> Option<[u8; 4]> {
        if !self.is_pending() {
            return None;
        }
        let bytes = self.command_bytes();
        self.buf = [0; FRAME_LEN];
        Some(bytes)
    }
}

impl Default for CommandFrame {
    fn default() -> Self {
        Self::new()
    }
}
