//! GPIO / peripheral pin assignments for the reference ESP32 board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers. Which of these are fitted is a runtime board
//! option (`AppConfig::has_*`).

// ---------------------------------------------------------------------------
// Standby
// ---------------------------------------------------------------------------

/// Standby button, active HIGH with pull-down. Also the ext0 wake source.
pub const BUTTON_STANDBY_GPIO: i32 = 4;
/// Presses closer than this to the previous edge are bounce.
pub const BUTTON_DEBOUNCE_MS: u32 = 50;

// ---------------------------------------------------------------------------
// Battery / power sense
// ---------------------------------------------------------------------------

/// External voltage (USB or supply) sense: HIGH = externally powered.
pub const SENSOR_VEXT_GPIO: i32 = 16;
/// Charger status output (TP4054): LOW = charging.
pub const SENSOR_CHARGING_GPIO: i32 = 17;

/// Low side of the VBAT resistor divider. Grounded only while sampling so
/// the divider draws nothing the rest of the time.
pub const GROUND_VBAT_GPIO: i32 = 12;
pub const GROUND_VBAT_ON: bool = false;
pub const GROUND_VBAT_OFF: bool = true;

/// VBAT divider tap: ADC1 channel 7 (GPIO 35).
pub const ADC1_CH_VBAT: u32 = 7;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Status LED, blinked once per second by the supervisor.
pub const LED_STATUS_GPIO: i32 = 5;
