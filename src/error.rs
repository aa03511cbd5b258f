//! Error types shared by the drivers and the acquisition state machine.
//!
//! Everything here is `Copy`: errors are logged and folded into a state
//! transition by the owning channel task, never carried across tasks.

use core::fmt;

use embedded_hal::i2c::{self, ErrorKind};

/// Which device on a channel's bus a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    /// Capacitance-to-digital converter.
    Capacitance,
    /// Humidity / temperature sensor.
    Climate,
    /// Relay driver.
    Relay,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacitance => write!(f, "capacitance sensor"),
            Self::Climate => write!(f, "humidity/temperature sensor"),
            Self::Relay => write!(f, "relay driver"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A bus transfer failed while `stage` was in progress.
    Bus {
        device: Device,
        stage: &'static str,
        kind: ErrorKind,
    },
    /// No conversion-complete signal arrived in time.
    CompletionTimeout { elapsed_ms: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus {
                device,
                stage,
                kind,
            } => write!(f, "{device}: {stage}: {kind}"),
            Self::CompletionTimeout { elapsed_ms } => {
                write!(f, "no conversion completed for {elapsed_ms} ms")
            }
        }
    }
}

impl Error {
    pub fn device(&self) -> Option<Device> {
        match self {
            Self::Bus { device, .. } => Some(*device),
            Self::CompletionTimeout { .. } => Some(Device::Capacitance),
        }
    }
}

/// Attaches device and stage context to a HAL bus result.
pub(crate) trait BusResultExt<T> {
    fn during(self, device: Device, stage: &'static str) -> Result<T, Error>;
}

impl<T, E: i2c::Error> BusResultExt<T> for Result<T, E> {
    fn during(self, device: Device, stage: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::Bus {
            device,
            stage,
            kind: e.kind(),
        })
    }
}
