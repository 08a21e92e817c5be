//! Port traits: the hexagonal boundary between the message layer and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MessageRouter / Supervisor (domain)
//! ```
//!
//! Driven adapters (chip queries, ADC, restart/deep-sleep) implement these
//! traits. The router and supervisor hold them as `Arc<dyn …>` because
//! both run on their own threads.

use crate::adapters::device_id::MacAddress;

// ───────────────────────────────────────────────────────────────
// Device port (driven adapter: board → domain)
// ───────────────────────────────────────────────────────────────

/// Static chip description reported by the `11:ESP32` info message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    pub model: u32,
    pub revision: u16,
    pub cores: u8,
    /// FreeRTOS built for a single core.
    pub unicore: bool,
    pub idf_version: heapless::String<32>,
}

/// Read-side port: chip facts and live measurements.
pub trait DevicePort: Send + Sync {
    fn chip_info(&self) -> ChipInfo;

    /// Bluetooth MAC address.
    fn mac_address(&self) -> MacAddress;

    /// Free 8-bit capable heap in bytes.
    fn free_heap(&self) -> u32;

    /// Supply voltage as reported by the PHY.
    fn vdd33(&self) -> i32;

    /// One raw battery ADC sample.
    fn sample_vbat(&self) -> u16;

    /// Connect the battery divider around a burst of samples.
    fn vbat_divider(&self, _enabled: bool) {}

    /// Toggle the status LED (called once per second).
    fn toggle_status_led(&self);
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → power control)
// ───────────────────────────────────────────────────────────────

/// Write-side port: delays, restart and deep sleep.
///
/// `restart` and `deep_sleep` do not return on hardware; host mocks return
/// so tests can observe the call.
pub trait SystemPort: Send + Sync {
    fn delay_ms(&self, ms: u32);

    fn restart(&self);

    /// Deep sleep, waking on the standby button.
    fn deep_sleep(&self);

    /// Stop the standby button interrupt before entering standby.
    fn disable_standby_button(&self);

    /// Release sensors, interrupts and indicator outputs.
    fn shutdown_peripherals(&self);
}
