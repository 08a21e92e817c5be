//! Supervisory task: the 1 Hz housekeeping loop.
//!
//! ```text
//!   ┌──────────── wait: ACTIONS.wait() | Timer::at(deadline) ───────────┐
//!   │                                                                   │
//!   ▼                                                                   │
//!   take action ──▶ ResetTimer / Standby* / ExternalPowerChanged        │
//!   │                                                                   │
//!   ▼  (deadline passed)                                                │
//!   tick: t += 1 · LED · vbat median · inactivity · energy · feedback ──┘
//! ```
//!
//! An early wake handles the action only; the per-second work still runs
//! on the deadline, so a burst of actions never speeds up the clock.

pub mod action;

pub use action::{ACTIONS, ActionSlot, SupervisorAction};

use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;
use log::{debug, info};

use crate::app::ports::DevicePort;
use crate::app::report_energy;
use crate::app::session::{AppSession, LogControl};
use crate::config::AppConfig;
use crate::link::LinkHandle;
use crate::power::{PowerManager, StandbyRequest};
use crate::sensors::{BatterySampler, EnergyMonitor, PowerSense};

const TICK: Duration = Duration::from_secs(1);
const DEBUG_EVERY_SECS: u32 = 5;

/// Shared state the supervisor reads and the link callbacks also touch.
pub struct SupervisorContext {
    pub session: Arc<AppSession>,
    pub log: Arc<LogControl>,
    pub energy: Arc<EnergyMonitor>,
    pub sense: &'static PowerSense,
    pub device: Arc<dyn DevicePort>,
    pub actions: &'static ActionSlot,
}

pub struct Supervisor<P> {
    cfg: AppConfig,
    ctx: SupervisorContext,
    power: PowerManager<P>,
    link: LinkHandle,
    battery: BatterySampler,
    last_charging: bool,
}

/// What the loop does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The board went to standby (host builds and boards without a
    /// standby button come back here).
    Standby,
}

impl<P: InputPin> Supervisor<P> {
    pub fn new(cfg: AppConfig, ctx: SupervisorContext, power: PowerManager<P>) -> Self {
        let link = power.link();
        let last_charging = ctx.sense.is_charging();
        Self {
            cfg,
            ctx,
            power,
            link,
            battery: BatterySampler::new(),
            last_charging,
        }
    }

    /// Run forever on the calling thread.
    pub fn run(mut self) -> ! {
        info!("SUP: running");
        let actions = self.ctx.actions;
        let mut deadline = Instant::now() + TICK;
        loop {
            wait_for_action(actions, deadline);

            if let Some(action) = actions.take() {
                if self.handle_action(action) {
                    deadline = Instant::now() + TICK;
                    continue;
                }
            }

            let now = Instant::now();
            if now < deadline {
                continue;
            }
            self.tick();
            deadline += TICK;
            if deadline <= now {
                deadline = now + TICK;
            }
        }
    }

    /// Handle one action. Returns `true` when the tick must be skipped.
    pub fn handle_action(&mut self, action: SupervisorAction) -> bool {
        debug!("SUP: handling {action:?}");
        match action {
            SupervisorAction::ResetTimer => {
                self.ctx.session.reset_timers();
                return true;
            }
            SupervisorAction::StandbyButton => self.standby(StandbyRequest::BUTTON),
            SupervisorAction::StandbyMessage => self.standby(StandbyRequest::MESSAGE),
            SupervisorAction::ExternalPowerChanged => {
                if self.cfg.has_battery {
                    report_energy(&self.ctx.energy, self.ctx.sense, &self.link, true);
                }
            }
        }
        false
    }

    /// One second of housekeeping.
    pub fn tick(&mut self) -> Flow {
        let t = self.ctx.session.tick();
        let sense = self.ctx.sense;

        self.ctx.device.toggle_status_led();
        if self.cfg.has_battery {
            let device = &self.ctx.device;
            device.vbat_divider(true);
            self.battery.update(sense, || device.sample_vbat());
            device.vbat_divider(false);
        }

        if self.ctx.log.is_active() && t % DEBUG_EVERY_SECS == 0 {
            if self.cfg.has_battery {
                debug!(
                    "SUP: secs={} vext={} charging={} vbat={} mem={}",
                    t,
                    yes_no(sense.is_external()),
                    yes_no(sense.is_charging()),
                    sense.vbat(),
                    self.ctx.device.free_heap()
                );
            } else {
                debug!("SUP: secs={}", t);
            }
        }

        if self.inactive(t) {
            self.standby(StandbyRequest::INACTIVITY);
            return Flow::Standby;
        }

        if !self.link.is_connected() {
            return Flow::Continue;
        }

        let charging = sense.is_charging();
        if self.cfg.has_battery {
            if self.cfg.has_charging_sensor && charging != self.last_charging {
                report_energy(&self.ctx.energy, sense, &self.link, true);
            }
            if t.checked_rem(self.cfg.energy_check_interval_secs) == Some(0) {
                report_energy(&self.ctx.energy, sense, &self.link, false);
            }
        }

        if let Some(max) = self.cfg.max_without_feedback_secs {
            if !self.ctx.log.is_active() && self.ctx.session.secs_since_feedback() >= max {
                self.standby(StandbyRequest::NO_FEEDBACK);
                return Flow::Standby;
            }
        }

        self.last_charging = charging;
        Flow::Continue
    }

    // Counted only off external power and on boards that can sleep.
    fn inactive(&self, t: u32) -> bool {
        let Some(max) = self.cfg.max_inactive_secs else {
            return false;
        };
        if !self.cfg.has_standby || (self.cfg.has_battery && self.ctx.sense.is_external()) {
            return false;
        }
        let idle = if self.link.is_connected() {
            self.ctx.session.secs_since_received()
        } else {
            t
        };
        idle >= max
    }

    fn standby(&mut self, request: StandbyRequest) {
        self.power.standby(request, &self.ctx.session, &self.ctx.log);
    }
}

/// Block until an action is posted or `deadline` passes. Returns `true`
/// when the wait ended because of a post.
pub fn wait_for_action(actions: &ActionSlot, deadline: Instant) -> bool {
    futures_lite::future::block_on(futures_lite::future::or(
        async {
            actions.wait().await;
            true
        },
        async {
            async_io_mini::Timer::at(deadline).await;
            false
        },
    ))
}

fn yes_no(flag: bool) -> char {
    if flag { 'Y' } else { 'N' }
}
