//! Conversion-complete bridge between interrupt and task context.
//!
//! The interrupt side only ever calls [`CompletionBridge::signal`]; it never
//! blocks and never touches the telemetry mutex. Each channel task is the only
//! consumer of its own flag.
//!
//! An edge that arrives while a line is disabled is latched, the way a
//! pending bit in an interrupt controller would be, and delivered on the next
//! `enable` unless `clear` discards it first.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::CHANNEL_COUNT;

struct Line {
    enabled: AtomicBool,
    latched: AtomicBool,
    flag: AtomicBool,
}

impl Line {
    const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            latched: AtomicBool::new(false),
            flag: AtomicBool::new(false),
        }
    }
}

pub struct CompletionBridge {
    lines: [Line; CHANNEL_COUNT],
}

impl CompletionBridge {
    /// All lines disabled and cleared.
    pub const fn new() -> Self {
        Self {
            lines: [const { Line::new() }; CHANNEL_COUNT],
        }
    }

    /// Interrupt-side entry point for a completed conversion on `channel`.
    pub fn signal(&self, channel: usize) {
        let line = &self.lines[channel];
        if line.enabled.load(Ordering::Acquire) {
            line.flag.store(true, Ordering::Release);
        } else {
            line.latched.store(true, Ordering::Release);
        }
    }

    pub fn enable(&self, channel: usize) {
        let line = &self.lines[channel];
        line.enabled.store(true, Ordering::Release);
        if line.latched.swap(false, Ordering::AcqRel) {
            line.flag.store(true, Ordering::Release);
        }
    }

    pub fn disable(&self, channel: usize) {
        self.lines[channel].enabled.store(false, Ordering::Release);
    }

    /// Drops an edge latched while the line was disabled.
    pub fn clear(&self, channel: usize) {
        self.lines[channel].latched.store(false, Ordering::Release);
    }

    /// Consumes the completion flag.
    pub fn take(&self, channel: usize) -> bool {
        self.lines[channel].flag.swap(false, Ordering::AcqRel)
    }

    /// Raises the flag from task context, used to self-start the pipeline.
    pub fn force(&self, channel: usize) {
        self.lines[channel].flag.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self, channel: usize) -> bool {
        self.lines[channel].enabled.load(Ordering::Acquire)
    }

    /// Disables and clears every line.
    pub fn reset(&self) {
        for line in &self.lines {
            line.enabled.store(false, Ordering::Release);
            line.latched.store(false, Ordering::Release);
            line.flag.store(false, Ordering::Release);
        }
    }
}

impl Default for CompletionBridge {
    fn default() -> Self {
        Self::new()
    }
}
