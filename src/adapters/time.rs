//! ESP32 time adapter.
//!
//! Millisecond clock for the line framer's receive timeout.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` (microsecond
//!   resolution, monotonic since boot).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation.
//!
//! The value is truncated to `u32` and wraps after ~49 days; the framer
//! compares with wrapping arithmetic.
//!
//! This module also provides the `embassy-time` driver that
//! `async_io_mini::Timer` links against: `_embassy_time_now` in 1 MHz ticks
//! and `_embassy_time_schedule_wake`, which parks a short-lived thread
//! until the deadline and then wakes the waiting task.

use core::task::Waker;
use std::time::Duration;

use crate::link::Clock;

/// Time-driver ticks (microseconds) since boot.
#[cfg(target_os = "espidf")]
fn driver_now_us() -> u64 {
    // SAFETY: esp_timer is started by the IDF before app_main.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

/// Time-driver ticks (microseconds) since first use.
#[cfg(not(target_os = "espidf"))]
fn driver_now_us() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_micros() as u64
}

#[unsafe(no_mangle)]
fn _embassy_time_now() -> u64 {
    driver_now_us()
}

#[unsafe(no_mangle)]
fn _embassy_time_schedule_wake(at: u64, waker: &Waker) {
    let waker = waker.clone();
    let spawned = std::thread::Builder::new()
        .name("time-wake".into())
        .stack_size(3 * 1024)
        .spawn(move || {
            let now = driver_now_us();
            if at > now {
                std::thread::sleep(Duration::from_micros(at - now));
            }
            waker.wake();
        });
    if let Err(e) = spawned {
        log::error!("TIME: wake thread spawn failed: {e}");
    }
}

pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer is started by the IDF before app_main.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since the adapter was created.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for Esp32Clock {
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }
}
