//! GPIO edge handling shared by every input interrupt.
//!
//! ```text
//!   edge ──▶ on_gpio_edge(gpio, level, now)
//!              ├─ standby button: debounce ──▶ ACTIONS.post_from_isr(StandbyButton)
//!              ├─ VEXT:     POWER_SENSE.external = level ──▶ post_from_isr(ExternalPowerChanged)
//!              └─ charging: POWER_SENSE.charging = !level (polled by the supervisor)
//! ```
//!
//! Everything in `on_gpio_edge` is lock-free and allocation-free; it runs
//! in ISR context on target. Posting from an ISR cannot wake the supervisor
//! directly, so a posted edge also sends a FreeRTOS task notification to a
//! small relay thread, which wakes the supervisor from task context.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::pins;
use crate::sensors::PowerSense;
use crate::supervisor::{ActionSlot, SupervisorAction};

/// Time and pin of the previous edge, for debouncing.
pub struct EdgeHistory {
    last_ms: AtomicU32,
    last_gpio: AtomicI32,
}

impl Default for EdgeHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeHistory {
    pub const fn new() -> Self {
        Self {
            last_ms: AtomicU32::new(0),
            last_gpio: AtomicI32::new(-1),
        }
    }

    fn is_bounce(&self, gpio: i32, now_ms: u32, window_ms: u32) -> bool {
        let last_ms = self.last_ms.load(Ordering::Relaxed);
        self.last_gpio.load(Ordering::Relaxed) == gpio
            && last_ms > 0
            && now_ms.wrapping_sub(last_ms) < window_ms
    }

    fn record(&self, gpio: i32, now_ms: u32) {
        self.last_ms.store(now_ms, Ordering::Relaxed);
        self.last_gpio.store(gpio, Ordering::Relaxed);
    }
}

pub static EDGES: EdgeHistory = EdgeHistory::new();

/// Handle one edge on `gpio`, now reading `level_high`.
pub fn on_gpio_edge(
    gpio: i32,
    level_high: bool,
    now_ms: u32,
    history: &EdgeHistory,
    sense: &PowerSense,
    actions: &ActionSlot,
) {
    match gpio {
        pins::BUTTON_STANDBY_GPIO => {
            if !history.is_bounce(gpio, now_ms, pins::BUTTON_DEBOUNCE_MS) {
                actions.post_from_isr(SupervisorAction::StandbyButton);
                kick_wake_relay();
            }
        }
        pins::SENSOR_VEXT_GPIO => {
            sense.set_external(level_high);
            actions.post_from_isr(SupervisorAction::ExternalPowerChanged);
            kick_wake_relay();
        }
        // Not notified: with no battery fitted the line floats and toggles
        // fast, so the supervisor samples it once per second instead.
        pins::SENSOR_CHARGING_GPIO => sense.set_charging(!level_high),
        _ => {}
    }
    history.record(gpio, now_ms);
}

#[cfg(target_os = "espidf")]
static WAKE_RELAY: std::sync::OnceLock<std::sync::Arc<esp_idf_hal::task::notification::Notifier>> =
    std::sync::OnceLock::new();

/// Start the thread that turns ISR notifications into supervisor wakes.
#[cfg(target_os = "espidf")]
pub fn spawn_wake_relay(actions: &'static ActionSlot) -> std::io::Result<()> {
    use crate::drivers::task_pin::{Core, spawn_on_core};
    use esp_idf_hal::task::notification::Notification;

    spawn_on_core(Core::App, 6, 3, "isr-wake\0", move || {
        let notification = Notification::new();
        if WAKE_RELAY.set(notification.notifier()).is_err() {
            log::warn!("SUP: wake relay already running");
            return;
        }
        loop {
            notification.wait_any();
            actions.wake();
        }
    })
    .map(drop)
}

/// Host builds have no GPIO interrupts to relay.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_wake_relay(_actions: &'static ActionSlot) -> std::io::Result<()> {
    Ok(())
}

#[cfg(target_os = "espidf")]
fn kick_wake_relay() {
    if let Some(notifier) = WAKE_RELAY.get() {
        // SAFETY: the relay thread never exits once registered, so the
        // task handle behind the notifier stays valid.
        let _ = unsafe { notifier.notify_and_yield(core::num::NonZeroU32::MIN) };
    }
}

#[cfg(not(target_os = "espidf"))]
fn kick_wake_relay() {}
