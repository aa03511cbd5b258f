//! Upstream link task.
//!
//! Each exchange ships a locked snapshot of the telemetry frame and receives
//! one command frame. The lock is released before the command is decoded;
//! applying a command only touches the parameter atomics.

use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

use crate::config::TransportConfig;
use crate::protocol::{Command, CommandFrame, InvalidCommand, FRAME_LEN};
use crate::state::Hub;

/// Full-duplex, fixed-size request/response link to the upstream controller.
#[allow(async_fn_in_trait)]
pub trait Link {
    type Error: Debug;

    /// Sends `outbound` and fills `inbound` with the frame received in the
    /// same exchange.
    async fn exchange(
        &mut self,
        outbound: &[u8; FRAME_LEN],
        inbound: &mut [u8; FRAME_LEN],
    ) -> Result<(), Self::Error>;
}

/// What one exchange did with the inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// No command was pending.
    Idle,
    Applied(Command),
    Rejected(InvalidCommand),
}

pub struct Transport<'a, L, M: RawMutex> {
    link: L,
    hub: &'a Hub<M>,
    outbound: [u8; FRAME_LEN],
    inbound: CommandFrame,
}

impl<'a, L: Link, M: RawMutex> Transport<'a, L, M> {
    pub fn new(link: L, hub: &'a Hub<M>) -> Self {
        Self {
            link,
            hub,
            outbound: [0; FRAME_LEN],
            inbound: CommandFrame::new(),
        }
    }

    /// Waits out the start-up delay, then exchanges frames forever.
    pub async fn run<D: DelayNs>(mut self, mut delay: D, config: TransportConfig) -> ! {
        delay.delay_ms(config.startup_delay_ms).await;
        info!("link up");

        loop {
            if let Err(e) = self.transact().await {
                #[cfg(feature = "defmt")]
                warn!("link exchange failed: {:?}", defmt::Debug2Format(&e));
                #[cfg(not(feature = "defmt"))]
                warn!("link exchange failed: {:?}", e);
                delay.delay_ms(config.error_backoff_ms).await;
            }
        }
    }

    /// One exchange: snapshot, send/receive, decode and apply.
    pub async fn transact(&mut self) -> Result<Outcome, L::Error> {
        self.hub.telemetry.snapshot(&mut self.outbound).await;

        if let Err(e) = self
            .link
            .exchange(&self.outbound, self.inbound.buffer_mut())
            .await
        {
            // A partial receive must not be decoded on the next pass.
            self.inbound = CommandFrame::new();
            return Err(e);
        }

        let Some(bytes) = self.inbound.take() else {
            return Ok(Outcome::Idle);
        };
        match Command::decode(bytes) {
            Ok(Some(cmd)) => {
                cmd.apply(&self.hub.params);
                info!("command applied: {:?}", cmd);
                Ok(Outcome::Applied(cmd))
            }
            Ok(None) => Ok(Outcome::Idle),
            Err(e) => {
                warn!("{}", e);
                Ok(Outcome::Rejected(e))
            }
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
