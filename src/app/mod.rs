//! Application layer: the line protocol spoken with the mobile app.
//!
//! The link hands every received line to [`callbacks::AppCallbacks`], which
//! runs it through the [`router::MessageRouter`] and sends the reply. Chip
//! facts and power control come in through the [`ports`] traits, so the
//! whole layer runs on the host against mocks.

pub mod callbacks;
pub mod fields;
pub mod ports;
pub mod router;
pub mod session;

use crate::link::LinkHandle;
use crate::sensors::{EnergyMonitor, PowerSense};

/// Run an energy check and send the `10:` report it asks for.
pub fn report_energy(energy: &EnergyMonitor, sense: &PowerSense, link: &LinkHandle, force: bool) {
    if let Some(message) = energy.report(sense, link.is_connected(), force) {
        link.send(&message);
    }
}
