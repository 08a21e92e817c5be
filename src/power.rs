//! Standby (soft off) and restart.
//!
//! ```text
//!   standby(cause)
//!     ├─ disable button ISR
//!     ├─ "99:<cause>" to the app (when asked and a session is open) + 500 ms
//!     ├─ BLE server finalize
//!     ├─ peripherals shutdown + 200 ms
//!     ├─ wait for the standby button to be released
//!     └─ deep sleep, ext0 wake on the button
//! ```
//!
//! Boards without a standby button never sleep; the request is logged and
//! the application session starts over.

use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::app::ports::SystemPort;
use crate::app::session::{AppSession, LogControl};
use crate::link::{BleServer, LinkHandle};

/// Grace period for the last message to leave before the radio goes down.
pub const REPLY_GRACE_MS: u32 = 500;
const SETTLE_MS: u32 = 200;
const RELEASE_POLL_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyRequest {
    pub cause: &'static str,
    /// Tell the app with `99:<cause>` before going down.
    pub notify_peer: bool,
}

impl StandbyRequest {
    pub const BUTTON: Self = Self {
        cause: "Pressed button standby",
        notify_peer: true,
    };
    pub const MESSAGE: Self = Self {
        cause: "99 code msg - standby",
        notify_peer: false,
    };
    pub const INACTIVITY: Self = Self {
        cause: "Attained maximum time of inactivity",
        notify_peer: true,
    };
    pub const NO_FEEDBACK: Self = Self {
        cause: "No feedback received in time",
        notify_peer: true,
    };
}

pub struct PowerManager<P> {
    system: Arc<dyn SystemPort>,
    server: BleServer,
    /// `None` on boards without a standby button.
    button: Option<P>,
}

impl<P: InputPin> PowerManager<P> {
    pub fn new(system: Arc<dyn SystemPort>, server: BleServer, button: Option<P>) -> Self {
        Self {
            system,
            server,
            button,
        }
    }

    pub fn link(&self) -> LinkHandle {
        self.server.handle()
    }

    pub fn server(&self) -> &BleServer {
        &self.server
    }

    pub fn restart(&self, session: &AppSession) {
        restart(&*self.system, session);
    }

    /// Enter deep sleep. Returns only on boards without a standby button,
    /// or on host builds where the system port returns.
    pub fn standby(&mut self, request: StandbyRequest, session: &AppSession, log: &LogControl) {
        let Some(button) = self.button.as_mut() else {
            warn!(
                "SUP: standby requested ({}), no standby button: not entering deep sleep",
                request.cause
            );
            session.reinitialize(log);
            return;
        };

        info!("SUP: entering standby: {}", request.cause);
        self.system.disable_standby_button();

        let link = self.server.handle();
        if request.notify_peer && session.app_connected() && link.is_connected() {
            link.send(&format!("99:{}", request.cause));
            self.system.delay_ms(REPLY_GRACE_MS);
        }

        self.server.finalize();
        self.system.shutdown_peripherals();
        self.system.delay_ms(SETTLE_MS);

        wait_for_release(button, &*self.system);

        self.system.deep_sleep();
    }
}

/// Restart, leaving the app time to read a pending reply.
pub fn restart(system: &dyn SystemPort, session: &AppSession) {
    if session.app_connected() {
        system.delay_ms(REPLY_GRACE_MS);
    }
    info!("SUP: restarting");
    system.restart();
}

/// Block until the button reads low; waking on a still-held button would
/// bounce straight back out of deep sleep.
pub fn wait_for_release<P: InputPin>(button: &mut P, system: &dyn SystemPort) {
    // A read error counts as released.
    while button.is_high().unwrap_or(false) {
        system.delay_ms(RELEASE_POLL_MS);
    }
}
