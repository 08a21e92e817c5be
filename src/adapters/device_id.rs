//! Device identity derived from the ESP32 Bluetooth MAC address.
//!
//! The advertised name comes from the configured template: a template
//! ending in `_` gets the last two MAC bytes appended in uppercase hex
//! (`Esp32_Device_` → `Esp32_Device_ABCD`), so boards on the same bench
//! are told apart. Any other template is used as is.

use core::fmt;
use core::fmt::Write as _;

/// Advertised device name.
pub type DeviceName = heapless::String<32>;

/// 6-byte MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Hex bytes joined by `sep` (`24;0A;C4;…`).
    pub fn separated(&self, sep: char) -> Separated {
        Separated { mac: *self, sep }
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.separated(':').fmt(f)
    }
}

pub struct Separated {
    mac: MacAddress,
    sep: char,
}

impl fmt::Display for Separated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.mac.0.iter().enumerate() {
            if i > 0 {
                f.write_char(self.sep)?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Read the Bluetooth MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte buffer for the duration of the call.
    let ret = unsafe {
        esp_idf_svc::sys::esp_read_mac(mac.as_mut_ptr(), esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_BT)
    };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        log::warn!("BLE: esp_read_mac failed (rc={ret})");
    }
    MacAddress(mac)
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    MacAddress([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

/// Expand the name template with the MAC suffix when it ends in `_`.
pub fn device_name(template: &str, mac: &MacAddress) -> DeviceName {
    let mut name = DeviceName::new();
    let _ = name.push_str(template);
    if template.ends_with('_') {
        let _ = write!(name, "{:02X}{:02X}", mac.0[4], mac.0[5]);
    }
    name
}
