//! Shared connection state.
//!
//! Written from exactly one place (the dispatcher's connection handling,
//! plus MTU updates from the stack callback) and read from any context,
//! so every field is a plain atomic.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

/// ATT MTU before the peer negotiates a larger one.
pub const DEFAULT_ATT_MTU: u16 = 23;
/// Opcode + handle bytes of an ATT notification.
pub const ATT_HEADER_LEN: u16 = 3;

#[derive(Debug)]
pub struct ConnectionState {
    connected: AtomicBool,
    mtu: AtomicU16,
    epoch: AtomicU32,
}

impl ConnectionState {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            mtu: AtomicU16::new(DEFAULT_ATT_MTU),
            epoch: AtomicU32::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns `true` when the flag actually changed.
    pub(crate) fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel) != connected
    }

    pub fn mtu(&self) -> u16 {
        self.mtu.load(Ordering::Relaxed)
    }

    pub(crate) fn set_mtu(&self, mtu: u16) {
        self.mtu.store(mtu.max(ATT_HEADER_LEN + 1), Ordering::Relaxed);
    }

    pub(crate) fn reset_mtu(&self) {
        self.mtu.store(DEFAULT_ATT_MTU, Ordering::Relaxed);
    }

    /// Usable payload bytes of one notification at the current MTU.
    pub fn mtu_payload(&self) -> usize {
        usize::from(self.mtu().saturating_sub(ATT_HEADER_LEN)).max(1)
    }

    /// Connection epoch, bumped on every connect. Lines are tagged with
    /// the epoch they were framed in.
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn next_epoch(&self) -> u32 {
        self.epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
