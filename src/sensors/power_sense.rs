//! Power sense lines, written from GPIO ISRs and read by the tasks.
//!
//! Lock-free: every field is an atomic so `set_*` is safe from interrupt
//! context.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

#[derive(Debug, Default)]
pub struct PowerSense {
    external: AtomicBool,
    charging: AtomicBool,
    vbat: AtomicU16,
}

impl PowerSense {
    pub const fn new() -> Self {
        Self {
            external: AtomicBool::new(false),
            charging: AtomicBool::new(false),
            vbat: AtomicU16::new(0),
        }
    }

    /// Running on external (USB) power.
    pub fn is_external(&self) -> bool {
        self.external.load(Ordering::Acquire)
    }

    pub fn set_external(&self, on: bool) {
        self.external.store(on, Ordering::Release);
    }

    pub fn is_charging(&self) -> bool {
        self.charging.load(Ordering::Acquire)
    }

    pub fn set_charging(&self, on: bool) {
        self.charging.store(on, Ordering::Release);
    }

    /// Last filtered battery ADC reading.
    pub fn vbat(&self) -> u16 {
        self.vbat.load(Ordering::Relaxed)
    }

    pub fn set_vbat(&self, raw: u16) {
        self.vbat.store(raw, Ordering::Relaxed);
    }
}
