//! Energy status reports (`10:<EXT|BAT>:<Y|N>:<vbat>:`).
//!
//! A report goes out when forced, or when running on battery and the
//! reading moved by more than the threshold since the last check. The last
//! reading is updated on every check, sent or not.

use core::sync::atomic::{AtomicU16, Ordering};

use log::debug;

use super::PowerSense;

#[derive(Debug)]
pub struct EnergyMonitor {
    last_vbat: AtomicU16,
    threshold: u16,
}

impl EnergyMonitor {
    pub const fn new(threshold: u16) -> Self {
        Self {
            last_vbat: AtomicU16::new(0),
            threshold,
        }
    }

    /// Check the current readings. Returns the message to send, if any.
    pub fn report(&self, sense: &PowerSense, connected: bool, force: bool) -> Option<String> {
        let vbat = sense.vbat();
        let external = sense.is_external();
        let last = self.last_vbat.swap(vbat, Ordering::Relaxed);

        if !connected {
            return None;
        }
        let moved = vbat.abs_diff(last) > self.threshold;
        if !force && (external || !moved) {
            return None;
        }
        debug!("APP: energy vbat={vbat} (was {last}) ext={external} force={force}");
        Some(format_status(sense))
    }
}

pub fn format_status(sense: &PowerSense) -> String {
    format!(
        "10:{}:{}:{}:",
        if sense.is_external() { "EXT" } else { "BAT" },
        if sense.is_charging() { 'Y' } else { 'N' },
        sense.vbat()
    )
}
