//! Status LED driver: a single GPIO blinked by the supervisor.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the pin via hw_init.
//! On host/test: tracks state in-memory only.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::drivers::hw_init;

pub struct StatusLed {
    gpio: i32,
    on: AtomicBool,
}

impl StatusLed {
    /// The LED starts lit; `hw_init` drives the pin high at boot.
    pub const fn new(gpio: i32) -> Self {
        Self {
            gpio,
            on: AtomicBool::new(true),
        }
    }

    pub fn set(&self, on: bool) {
        hw_init::gpio_write(self.gpio, on);
        self.on.store(on, Ordering::Relaxed);
    }

    pub fn toggle(&self) {
        let on = !self.on.fetch_xor(true, Ordering::Relaxed);
        hw_init::gpio_write(self.gpio, on);
    }

    pub fn off(&self) {
        self.set(false);
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}
