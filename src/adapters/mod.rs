//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements            | Connects to                  |
//! |-------------|-----------------------|------------------------------|
//! | `ble`       | BleStack, NotifyPort  | Bluedroid GATT server        |
//! | `hardware`  | DevicePort            | chip info, ADC, status LED   |
//! |             | SystemPort            | restart, deep sleep, delays  |
//! | `time`      | Clock                 | ESP32 system timer           |
//! | `device_id` | (helpers)             | Bluetooth MAC, device name   |

pub mod ble;
pub mod device_id;
pub mod hardware;
pub mod time;
