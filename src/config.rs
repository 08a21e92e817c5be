//! System configuration parameters
//!
//! All tunable parameters of the BLE link and the application layer.
//! Defaults match the shipped board; a JSON override can be applied at boot.

use serde::{Deserialize, Serialize};

use crate::drivers::task_pin::Core;
use crate::link::{DEFAULT_SEND_CEILING, DispatchMode, LINE_CAPACITY};

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// Placement of the deferred dispatch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            core: Core::App,
            priority: 5,
            stack_kb: 10,
        }
    }
}

/// BLE transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Partial line discarded after this long without a new chunk (ms)
    pub recv_timeout_ms: u32,
    /// Longest accepted line; extra bytes are truncated
    pub max_line_len: usize,
    /// Upper bound for one outbound notification, independent of MTU
    pub send_ceiling: usize,
    /// Where application callbacks run
    pub dispatch: DispatchMode,
    /// Worker placement for `DispatchMode::Deferred`
    pub worker: WorkerConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recv_timeout_ms: 1500,
            max_line_len: LINE_CAPACITY,
            send_ceiling: DEFAULT_SEND_CEILING,
            dispatch: DispatchMode::Deferred,
            worker: WorkerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Application / board configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Version reported in the `01:` handshake
    pub fw_version: heapless::String<16>,
    /// Advertised name; a trailing `_` gets the last two MAC bytes appended
    pub device_name: heapless::String<24>,

    // --- Board options ---
    pub has_battery: bool,
    pub has_charging_sensor: bool,
    /// Standby button fitted (deep sleep supported)
    pub has_standby: bool,

    // --- Timeouts (seconds, `None` = disabled) ---
    /// Standby after this long without received data
    pub max_inactive_secs: Option<u32>,
    /// Standby after this long without a feedback message
    pub max_without_feedback_secs: Option<u32>,

    // --- Energy ---
    /// Periodic energy report interval while connected (seconds)
    pub energy_check_interval_secs: u32,
    /// Battery ADC change that triggers an unsolicited report
    pub vbat_change_threshold: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut fw_version = heapless::String::new();
        let _ = fw_version.push_str("0.3.0");
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str("Esp32_Device_");
        Self {
            fw_version,
            device_name,
            has_battery: false,
            has_charging_sensor: false,
            has_standby: false,
            max_inactive_secs: Some(300),
            max_without_feedback_secs: None,
            energy_check_interval_secs: 60,
            vbat_change_threshold: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Whole system
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub link: LinkConfig,
    pub app: AppConfig,
}

impl SystemConfig {
    /// Parse a JSON override. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| crate::error::Error::Config("malformed JSON"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::Error::Config;
        if self.link.recv_timeout_ms == 0 {
            return Err(Config("recv_timeout_ms must be > 0"));
        }
        if self.link.max_line_len == 0 || self.link.max_line_len > LINE_CAPACITY {
            return Err(Config("max_line_len out of range"));
        }
        if self.link.send_ceiling == 0 {
            return Err(Config("send_ceiling must be > 0"));
        }
        if self.app.has_charging_sensor && !self.app.has_battery {
            return Err(Config("charging sensor requires a battery"));
        }
        if self.app.energy_check_interval_secs == 0 {
            return Err(Config("energy_check_interval_secs must be > 0"));
        }
        Ok(())
    }
}
