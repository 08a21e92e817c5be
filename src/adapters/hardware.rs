//! Hardware adapter: bridges the board to the domain port traits.
//!
//! [`EspDevice`] answers chip queries and takes battery samples for
//! [`DevicePort`]; [`EspSystem`] owns delays, restart and deep sleep for
//! [`SystemPort`]. On non-espidf targets both return fixed simulation
//! values so the router and supervisor run unchanged on the host.

use log::info;

use crate::adapters::device_id::{self, MacAddress};
use crate::app::ports::{ChipInfo, DevicePort, SystemPort};
use crate::config::AppConfig;
use crate::drivers::hw_init;
use crate::drivers::status_led::StatusLed;
use crate::pins;

#[cfg(target_os = "espidf")]
unsafe extern "C" {
    /// ROM PHY helper; not exported by the generated bindings.
    fn rom_phy_get_vdd33() -> i32;
}

// ── Device ────────────────────────────────────────────────────

pub struct EspDevice {
    mac: MacAddress,
    led: StatusLed,
}

impl Default for EspDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl EspDevice {
    pub fn new() -> Self {
        Self {
            mac: device_id::read_mac(),
            led: StatusLed::new(pins::LED_STATUS_GPIO),
        }
    }
}

impl DevicePort for EspDevice {
    #[cfg(target_os = "espidf")]
    fn chip_info(&self) -> ChipInfo {
        use esp_idf_svc::sys::*;

        let mut info: esp_chip_info_t = unsafe { core::mem::zeroed() };
        // SAFETY: fills a caller-owned struct.
        unsafe { esp_chip_info(&mut info) };

        let mut idf_version = heapless::String::new();
        // SAFETY: esp_get_idf_version returns a static NUL-terminated string.
        let version = unsafe { core::ffi::CStr::from_ptr(esp_get_idf_version()) };
        for c in version.to_string_lossy().chars() {
            if idf_version.push(c).is_err() {
                break;
            }
        }

        ChipInfo {
            model: info.model as u32,
            revision: info.revision,
            cores: info.cores,
            unicore: cfg!(esp_idf_freertos_unicore),
            idf_version,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn chip_info(&self) -> ChipInfo {
        let mut idf_version = heapless::String::new();
        let _ = idf_version.push_str("sim");
        ChipInfo {
            model: 1,
            revision: 0,
            cores: 2,
            unicore: false,
            idf_version,
        }
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        256 * 1024
    }

    #[cfg(target_os = "espidf")]
    fn vdd33(&self) -> i32 {
        unsafe { rom_phy_get_vdd33() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn vdd33(&self) -> i32 {
        3300
    }

    fn sample_vbat(&self) -> u16 {
        hw_init::adc1_read(pins::ADC1_CH_VBAT)
    }

    fn vbat_divider(&self, enabled: bool) {
        hw_init::vbat_divider(enabled);
    }

    fn toggle_status_led(&self) {
        self.led.toggle();
    }
}

// ── System ────────────────────────────────────────────────────

pub struct EspSystem {
    cfg: AppConfig,
}

impl EspSystem {
    pub fn new(cfg: AppConfig) -> Self {
        Self { cfg }
    }
}

impl SystemPort for EspSystem {
    #[cfg(target_os = "espidf")]
    fn delay_ms(&self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    #[cfg(target_os = "espidf")]
    fn restart(&self) {
        info!("SYS: restart");
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&self) {
        info!("SYS(sim): restart");
    }

    #[cfg(target_os = "espidf")]
    fn deep_sleep(&self) {
        use esp_idf_svc::sys::*;
        info!("SYS: deep sleep, wake on GPIO{}", pins::BUTTON_STANDBY_GPIO);
        unsafe {
            let ret = esp_sleep_enable_ext0_wakeup(pins::BUTTON_STANDBY_GPIO, 1);
            if ret != ESP_OK as i32 {
                log::error!("SYS: ext0 wakeup setup failed ({})", ret);
            }
            esp_deep_sleep_start();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&self) {
        info!("SYS(sim): deep sleep");
    }

    fn disable_standby_button(&self) {
        hw_init::disable_isr(pins::BUTTON_STANDBY_GPIO);
    }

    fn shutdown_peripherals(&self) {
        hw_init::shutdown_peripherals(&self.cfg);
    }
}
