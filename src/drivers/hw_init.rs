//! One-shot hardware peripheral initialization.
//!
//! Configures the sense inputs, the status LED and VBAT ground outputs and
//! the VBAT ADC channel using raw ESP-IDF sys calls, then installs the GPIO
//! ISR service. Called once from `main()` before the BLE server starts.
//! Which pins are touched depends on the board options in [`AppConfig`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

use crate::config::AppConfig;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(cfg: &AppConfig) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any other task touches GPIO.
    unsafe {
        init_gpio_inputs(cfg)?;
        init_gpio_outputs(cfg)?;
        if cfg.has_battery {
            init_adc()?;
        }
    }
    info!("hw_init: peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_cfg: &AppConfig) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: ADC1_HANDLE is written once by `init_adc()` before the
/// supervisor starts; afterwards only the supervisor reads it.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), pins::ADC1_CH_VBAT, &chan_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    info!("hw_init: ADC1 configured (CH{}=VBAT)", pins::ADC1_CH_VBAT);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    if unsafe { adc1_handle() }.is_null() {
        return 0;
    }
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; the supervisor is the only reader.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> u16 {
    0
}

/// Ground the VBAT divider for sampling (`true`) or float it again.
pub fn vbat_divider(enabled: bool) {
    gpio_write(
        pins::GROUND_VBAT_GPIO,
        if enabled { pins::GROUND_VBAT_ON } else { pins::GROUND_VBAT_OFF },
    );
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn config_input(pin: i32, intr_type: gpio_int_type_t) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs(cfg: &AppConfig) -> Result<(), HwInitError> {
    use crate::sensors::POWER_SENSE;

    if cfg.has_standby {
        unsafe { config_input(pins::BUTTON_STANDBY_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE)? };
    }
    if cfg.has_battery {
        unsafe { config_input(pins::SENSOR_VEXT_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE)? };
        // First reading here, every later one comes from the ISR.
        POWER_SENSE.set_external(gpio_read(pins::SENSOR_VEXT_GPIO));
    }
    if cfg.has_charging_sensor {
        unsafe { config_input(pins::SENSOR_CHARGING_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE)? };
        POWER_SENSE.set_charging(!gpio_read(pins::SENSOR_CHARGING_GPIO));
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: every input reads low (button released, no external power).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    false
}

/// A raw input pin as an `embedded-hal` [`InputPin`](embedded_hal::digital::InputPin).
#[derive(Debug, Clone, Copy)]
pub struct RawInputPin(pub i32);

impl embedded_hal::digital::ErrorType for RawInputPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::InputPin for RawInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.0))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!gpio_read(self.0))
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs(cfg: &AppConfig) -> Result<(), HwInitError> {
    let mut outputs = heapless::Vec::<(i32, bool), 2>::new();
    let _ = outputs.push((pins::LED_STATUS_GPIO, true));
    if cfg.has_battery {
        let _ = outputs.push((pins::GROUND_VBAT_GPIO, pins::GROUND_VBAT_OFF));
    }

    for &(pin, level) in &outputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        gpio_write(pin, level);
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs().
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gpio_isr(arg: *mut core::ffi::c_void) {
    let gpio = arg as usize as i32;
    // SAFETY: esp_timer_get_time and gpio_get_level are register reads;
    // safe in ISR context.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    let level = unsafe { gpio_get_level(gpio) } != 0;
    crate::drivers::gpio_isr::on_gpio_edge(
        gpio,
        level,
        now_ms,
        &crate::drivers::gpio_isr::EDGES,
        &crate::sensors::POWER_SENSE,
        &crate::supervisor::ACTIONS,
    );
}

#[cfg(target_os = "espidf")]
fn isr_pins(cfg: &AppConfig) -> heapless::Vec<i32, 3> {
    let mut isr = heapless::Vec::new();
    if cfg.has_standby {
        let _ = isr.push(pins::BUTTON_STANDBY_GPIO);
    }
    if cfg.has_battery {
        let _ = isr.push(pins::SENSOR_VEXT_GPIO);
    }
    if cfg.has_charging_sensor {
        let _ = isr.push(pins::SENSOR_CHARGING_GPIO);
    }
    isr
}

/// Install the per-pin GPIO ISR service and register the edge handler on
/// every fitted input. Call after init_peripherals().
#[cfg(target_os = "espidf")]
pub fn init_isr_service(cfg: &AppConfig) -> Result<(), HwInitError> {
    let pins = isr_pins(cfg);
    if pins.is_empty() {
        return Ok(());
    }
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed. The handler only touches atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        for &pin in &pins {
            let ret = gpio_isr_handler_add(pin, Some(gpio_isr), pin as usize as *mut core::ffi::c_void);
            if ret != ESP_OK as i32 {
                return Err(HwInitError::IsrInstallFailed(ret));
            }
        }
    }
    info!("hw_init: ISR service installed ({} pins)", pins.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_cfg: &AppConfig) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

/// Stop interrupts from `pin`.
#[cfg(target_os = "espidf")]
pub fn disable_isr(pin: i32) {
    // SAFETY: removing a handler that was never added is a no-op error.
    unsafe {
        gpio_intr_disable(pin);
        gpio_isr_handler_remove(pin);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn disable_isr(_pin: i32) {}

/// Peripheral teardown before deep sleep: LED off, input interrupts
/// removed, VBAT divider floating.
pub fn shutdown_peripherals(cfg: &AppConfig) {
    gpio_write(pins::LED_STATUS_GPIO, false);
    if cfg.has_standby {
        disable_isr(pins::BUTTON_STANDBY_GPIO);
    }
    if cfg.has_battery {
        disable_isr(pins::SENSOR_VEXT_GPIO);
        vbat_divider(false);
    }
    if cfg.has_charging_sensor {
        disable_isr(pins::SENSOR_CHARGING_GPIO);
    }
    log::debug!("hw_init: peripherals finalized");
}
