//! Host-side stand-ins for the bus, the delay and the upstream link.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use sensor_hub::protocol::FRAME_LEN;
use sensor_hub::tasks::Link;

pub const CAP_ADDR: u8 = 0x48;
pub const CLIMATE_ADDR: u8 = 0x40;
pub const RELAY_ADDR: u8 = 0x41;

/// One bus transaction as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub addr: u8,
    pub write: Vec<u8>,
    pub read_len: usize,
}

/// Scripted I2C bus.
///
/// Every device keeps a register pointer set by the first byte of the last
/// write, and reads are served from the data registered for that pointer.
/// Reads with nothing registered return zeroes.
#[derive(Default)]
pub struct MockBus {
    pub log: Vec<Transfer>,
    nack: HashSet<u8>,
    pointers: HashMap<u8, u8>,
    data: HashMap<(u8, u8), VecDeque<Vec<u8>>>,
    sticky: HashMap<(u8, u8), Vec<u8>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `addr` stop acknowledging.
    pub fn nack(&mut self, addr: u8) {
        self.nack.insert(addr);
    }

    pub fn ack(&mut self, addr: u8) {
        self.nack.remove(&addr);
    }

    /// Queues one response for a read of `reg` on `addr`.
    pub fn push_read(&mut self, addr: u8, reg: u8, bytes: &[u8]) {
        self.data
            .entry((addr, reg))
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Response served once the queue for `reg` is empty.
    pub fn set_read(&mut self, addr: u8, reg: u8, bytes: &[u8]) {
        self.sticky.insert((addr, reg), bytes.to_vec());
    }

    pub fn writes_to(&self, addr: u8) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter(|t| t.addr == addr && !t.write.is_empty())
            .map(|t| t.write.clone())
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn fill(&mut self, addr: u8, buf: &mut [u8]) {
        let reg = self.pointers.get(&addr).copied().unwrap_or(0);
        let bytes = self
            .data
            .get_mut(&(addr, reg))
            .and_then(|q| q.pop_front())
            .or_else(|| self.sticky.get(&(addr, reg)).cloned())
            .unwrap_or_default();
        buf.fill(0);
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut transfer = Transfer {
            addr: address,
            write: Vec::new(),
            read_len: 0,
        };
        if self.nack.contains(&address) {
            self.log.push(transfer);
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    if let Some(&reg) = bytes.first() {
                        self.pointers.insert(address, reg);
                    }
                    transfer.write.extend_from_slice(bytes);
                }
                Operation::Read(buf) => {
                    transfer.read_len += buf.len();
                    self.fill(address, buf);
                }
            }
        }
        self.log.push(transfer);
        Ok(())
    }
}

/// Returns immediately, counting the milliseconds it was asked to sleep.
#[derive(Default)]
pub struct MockDelay {
    pub total_ms: u64,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    async fn delay_us(&mut self, us: u32) {
        self.total_ms += u64::from(us) / 1_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}

/// Records every outbound frame and replies with queued inbound frames
/// (all zero once the queue runs dry).
#[derive(Default)]
pub struct MockLink {
    pub sent: Vec<[u8; FRAME_LEN]>,
    pub replies: VecDeque<[u8; FRAME_LEN]>,
    pub fail_next: bool,
}

impl MockLink {
    pub fn reply_with_command(&mut self, cmd: [u8; 4]) {
        let mut frame = [0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&cmd);
        self.replies.push_back(frame);
    }
}

impl Link for MockLink {
    type Error = &'static str;

    async fn exchange(
        &mut self,
        outbound: &[u8; FRAME_LEN],
        inbound: &mut [u8; FRAME_LEN],
    ) -> Result<(), Self::Error> {
        self.sent.push(*outbound);
        if self.fail_next {
            self.fail_next = false;
            inbound[..4].copy_from_slice(&[1, 1, 1, 0]);
            return Err("link down");
        }
        *inbound = self.replies.pop_front().unwrap_or([0; FRAME_LEN]);
        Ok(())
    }
}
