//! Message router: validates a received line and runs its handler.
//!
//! ```text
//!   "71:Y"  ──▶ validate ──▶ mark feedback ──▶ handler ──▶ Reply
//!                  │                                        │
//!                  └──▶ RouteError ("-1:<text>")            └──▶ response / energy / action
//! ```
//!
//! The router never touches the link. It mutates session and log state and
//! describes what the caller must send or do in a [`Reply`].

use core::fmt;
use core::fmt::Write as _;
use std::sync::Arc;

use log::{debug, trace};

use super::fields::Fields;
use super::ports::DevicePort;
use super::session::{AppSession, LogControl};
use crate::config::AppConfig;
use crate::sensors::PowerSense;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejected line. The text is what the peer receives after `-1:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    TooShort,
    NonNumericCode,
    InvalidCode,
    UnknownCode(i32),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "Message length must have 2 or more characters"),
            Self::NonNumericCode => write!(f, "Non-numeric message code"),
            Self::InvalidCode => write!(f, "Invalid message code"),
            Self::UnknownCode(code) => write!(f, "Code of message invalid: {code}"),
        }
    }
}

impl std::error::Error for RouteError {}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Deferred system action, run after the response went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Restart,
    Standby,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub response: Option<String>,
    /// Follow the response with a forced `10:` energy report.
    pub send_energy: bool,
    /// Ask the supervisor to restart its clock.
    pub reset_timer: bool,
    pub action: Option<PostAction>,
}

impl Reply {
    fn respond(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct MessageRouter {
    cfg: AppConfig,
    session: Arc<AppSession>,
    log: Arc<LogControl>,
    sense: &'static PowerSense,
    device: Arc<dyn DevicePort>,
    device_name: String,
}

impl MessageRouter {
    pub fn new(
        cfg: AppConfig,
        session: Arc<AppSession>,
        log: Arc<LogControl>,
        sense: &'static PowerSense,
        device: Arc<dyn DevicePort>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            cfg,
            session,
            log,
            sense,
            device,
            device_name: device_name.into(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Process one received line.
    ///
    /// A line with a valid code marks the feedback time even when the code
    /// itself is unknown.
    pub fn route(&self, line: &str) -> Result<Reply, RouteError> {
        if line.len() < 2 {
            return Err(RouteError::TooShort);
        }
        let fields = Fields::new(line);
        if !fields.is_num(1) {
            return Err(RouteError::NonNumericCode);
        }
        let code = fields.int(1);
        if code == 0 {
            return Err(RouteError::InvalidCode);
        }

        self.session.mark_feedback();

        match code {
            1 => Ok(self.start_session()),
            10 if self.cfg.has_battery => Ok(Reply {
                send_energy: true,
                ..Reply::default()
            }),
            11 => Ok(self.info(fields.str(2))),
            70 => Ok(Reply::respond(line)),
            71 => {
                self.log_control(fields.char(2));
                Ok(Reply::default())
            }
            80 => Ok(Reply::respond("80:")),
            98 => Ok(Reply {
                action: Some(PostAction::Restart),
                ..Reply::default()
            }),
            99 => Ok(Reply {
                action: Some(PostAction::Standby),
                ..Reply::default()
            }),
            other => Err(RouteError::UnknownCode(other)),
        }
    }

    // ── Handlers ─────────────────────────────────────────────

    /// `01:` the app opened a session.
    fn start_session(&self) -> Reply {
        if self.log.is_active() {
            self.debug_initial();
        }
        self.session.reinitialize(&self.log);
        self.session.set_app_connected(true);

        // Battery boards log only on external power.
        let wants_log = !self.cfg.has_battery || self.sense.is_external();
        if wants_log && !self.log.is_active() {
            self.log.activate();
            self.debug_initial();
        }

        Reply {
            response: Some(format!(
                "01:{}:{}:{}",
                self.cfg.fw_version,
                yes_no(self.cfg.has_battery),
                yes_no(self.cfg.has_charging_sensor)
            )),
            send_energy: self.cfg.has_battery,
            reset_timer: true,
            action: None,
        }
    }

    /// `11:<kind>` device information block.
    fn info(&self, kind: &str) -> Reply {
        let all = kind == "ALL";
        let mut out = String::new();

        if all || kind == "ESP32" {
            let chip = self.device.chip_info();
            let mac = self.device.mac_address();
            let _ = write!(
                out,
                "11:ESP32:*** Chip Info#* Model; {}#* Revision; {}#* Cores; {}\
                 #* FreeRTOS unicore ?; {}#* ESP-IDF;#  {}\
                 #*** BLE info#* Device name; {}#* Mac-address; {}#\n",
                chip.model,
                chip.revision,
                chip.cores,
                if chip.unicore { "Yes" } else { "No" },
                chip.idf_version,
                self.device_name,
                mac.separated(';'),
            );
        }
        if all || kind == "FMEM" {
            let _ = writeln!(out, "11:FMEM:{}", self.device.free_heap());
        }
        if all || kind == "VDD33" {
            let _ = writeln!(out, "11:VDD33:{}", self.device.vdd33());
        }

        let energy = self.cfg.has_battery && (all || kind == "VBAT" || kind == "VEXT");
        Reply {
            response: Some(out),
            send_energy: energy,
            ..Reply::default()
        }
    }

    /// `71:<Y|N|R>` runtime logging switch.
    fn log_control(&self, option: Option<char>) {
        match option {
            Some('Y') => {
                self.log.save();
                self.log.activate();
                self.debug_initial();
            }
            Some('N') => {
                self.log.save();
                self.log.deactivate();
            }
            Some('R') => self.log.restore(),
            other => debug!("APP: ignoring log option {other:?}"),
        }
    }

    fn debug_initial(&self) {
        trace!("APP: debugging is on now");
        trace!("APP: firmware version {}", self.cfg.fw_version);
    }
}

fn yes_no(flag: bool) -> char {
    if flag { 'Y' } else { 'N' }
}
