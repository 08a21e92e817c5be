//! Link callbacks: connection bookkeeping and line handling.
//!
//! Runs on the link's dispatch context. Nothing here blocks for long except
//! the reply grace delay before a restart; standby is handed to the
//! supervisor through the action slot.

use std::sync::Arc;

use log::{debug, error, info};

use super::ports::SystemPort;
use super::report_energy;
use super::router::{MessageRouter, PostAction, Reply};
use super::session::{AppSession, LogControl};
use crate::link::{Escaped, Line, LinkCallbacks, LinkHandle};
use crate::power::{self, REPLY_GRACE_MS};
use crate::sensors::{EnergyMonitor, PowerSense};
use crate::supervisor::{ActionSlot, SupervisorAction};

pub struct AppCallbacks {
    router: MessageRouter,
    session: Arc<AppSession>,
    log: Arc<LogControl>,
    energy: Arc<EnergyMonitor>,
    sense: &'static PowerSense,
    link: LinkHandle,
    system: Arc<dyn SystemPort>,
    actions: &'static ActionSlot,
}

impl AppCallbacks {
    /// Every successful send counts as feedback, so `link` gets a send
    /// hook marking it on `session`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: MessageRouter,
        session: Arc<AppSession>,
        log: Arc<LogControl>,
        energy: Arc<EnergyMonitor>,
        sense: &'static PowerSense,
        link: LinkHandle,
        system: Arc<dyn SystemPort>,
        actions: &'static ActionSlot,
    ) -> Self {
        let marker = session.clone();
        link.set_send_hook(move || marker.mark_feedback());
        Self {
            router,
            session,
            log,
            energy,
            sense,
            link,
            system,
            actions,
        }
    }

    fn apply(&self, reply: Reply) {
        if reply.reset_timer {
            self.actions.post(SupervisorAction::ResetTimer);
        }
        if let Some(response) = reply.response.filter(|r| !r.is_empty()) {
            if self.link.is_connected() {
                self.link.send(&response);
            }
        }
        if reply.send_energy {
            report_energy(&self.energy, self.sense, &self.link, true);
        }
        self.session.mark_received();

        match reply.action {
            Some(PostAction::Restart) => power::restart(&*self.system, &self.session),
            Some(PostAction::Standby) if self.router.config().has_standby => {
                if self.session.app_connected() {
                    self.system.delay_ms(REPLY_GRACE_MS);
                }
                self.actions.post(SupervisorAction::StandbyMessage);
            }
            Some(PostAction::Standby) => power::restart(&*self.system, &self.session),
            None => {}
        }
    }
}

impl LinkCallbacks for AppCallbacks {
    fn on_connect(&self) {
        info!("APP: peer connected");
        self.session.set_app_connected(false);
    }

    fn on_disconnect(&self) {
        info!("APP: peer disconnected");
        self.session.set_app_connected(false);
        self.session.reinitialize(&self.log);
    }

    fn on_receive(&self, line: Line) {
        debug!("APP: line \"{}\"", Escaped(line.as_bytes()));
        let text = line.text();
        match self.router.route(&text) {
            Ok(reply) => self.apply(reply),
            Err(e) => {
                error!("APP: {e}");
                if self.link.is_connected() {
                    self.link.send(&format!("-1:{e}"));
                }
            }
        }
    }
}
