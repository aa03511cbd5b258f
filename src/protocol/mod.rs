//! Upstream wire protocol: the telemetry frame going out and the command
//! frame coming in, both fixed at 119 bytes.

pub mod command;
pub mod frame;

pub use command::{Command, CommandFrame, InvalidCommand};
pub use frame::{ChannelBlock, TelemetryFrame, FRAME_LEN};
