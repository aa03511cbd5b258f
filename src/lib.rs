//! Six-channel capacitance / climate sensor hub.
//!
//! Each channel pairs a capacitance-to-digital converter, a humidity and
//! temperature sensor and a two-position relay on its own I2C bus. Six
//! acquisition tasks poll their channel and publish into one shared
//! telemetry frame; a seventh task ships that frame upstream over a
//! fixed-size request/response link and applies any command it receives.
//!
//! The core is hardware independent: buses and delays come in through the
//! `embedded-hal-async` traits, the upstream link through [`tasks::transport::Link`].
//! The board wiring lives in the `sensor-hub` binary (`board` feature).
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod error;
pub mod irq;
pub mod protocol;
pub mod state;
pub mod tasks;

pub use error::{Device, Error};

/// Number of acquisition channels on the board.
pub const CHANNEL_COUNT: usize = 6;
