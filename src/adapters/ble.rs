//! Bluedroid GATT server carrying the line link.
//!
//! Implements [`BleStack`] on top of the raw Bluedroid API: one primary
//! service in the Nordic UART layout, advertised under the device name.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Attribute  | UUID                                   | Props               |
//! |------------|----------------------------------------|---------------------|
//! | Service    | `6e400001-b5a3-f393-e0a9-e50e24dcca9e` |                     |
//! | RX (write) | `6e400002-…-e50e24dcca9e` + CCCD       | Read+Write+Notify   |
//! | TX (notify)| `6e400003-…-e50e24dcca9e` + CCCD       | Read+Write+Notify   |
//!
//! ## Registration sequence
//!
//! ```text
//!   REG ──▶ config adv data ──▶ create service
//!                 │                   │
//!                 ▼                   ▼
//!   ADV_DATA_SET_COMPLETE       CREATE ──▶ start service, add RX
//!     └─▶ start advertising     ADD_CHAR(RX) ──▶ add CCCD
//!                               ADD_DESCR    ──▶ add TX
//!                               ADD_CHAR(TX) ──▶ add CCCD
//!                               ADD_DESCR    ──▶ ready
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::link::{BleStack, LinkError, LinkIngress, NotifyPort};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_RX_UUID: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_TX_UUID: u128 = 0x6e400003_b5a3_f393_e0a9_e50e24dcca9e;

/// Client characteristic configuration descriptor.
pub const CCCD_UUID: u16 = 0x2902;

/// Attribute handles the service needs: declaration, two characteristics
/// with value and CCCD each, plus slack.
pub const SERVICE_HANDLES: u16 = 8;

/// Advertised manufacturer data.
pub const MANUFACTURER_DATA: [u8; 4] = [0x12, 0x23, 0x45, 0x56];

const ADV_INTERVAL_MIN: u16 = 0x20;
const ADV_INTERVAL_MAX: u16 = 0x40;

/// `ESP_GATT_IF_NONE`.
const GATT_IF_NONE: u32 = 0xff;

#[cfg(not(target_os = "espidf"))]
const SIM_RX_HANDLE: u16 = 42;
#[cfg(not(target_os = "espidf"))]
const SIM_TX_HANDLE: u16 = 44;

// ───────────────────────────────────────────────────────────────
// Static state
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the adapter.

static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(GATT_IF_NONE);
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
static BLE_RX_HANDLE: AtomicU32 = AtomicU32::new(0);
static BLE_TX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);

// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
static BLE_INGRESS: Mutex<Option<LinkIngress>> = Mutex::new(None);

fn ingress() -> Option<LinkIngress> {
    BLE_INGRESS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn set_ingress(ingress: Option<LinkIngress>) {
    *BLE_INGRESS.lock().unwrap_or_else(PoisonError::into_inner) = ingress;
}

// ───────────────────────────────────────────────────────────────
// Event routing
// ───────────────────────────────────────────────────────────────

/// The GATT server events the link cares about, decoded from the
/// Bluedroid parameter union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattEvent<'a> {
    Connect { gatts_if: u8, conn_id: u16 },
    Disconnect,
    Mtu(u16),
    Write { handle: u16, data: &'a [u8] },
}

/// Forward one server event to the registered ingress. The ingress is
/// cloned out of the lock so framing and dispatch never run under it.
pub fn route_event(event: GattEvent<'_>) {
    match event {
        GattEvent::Connect { gatts_if, conn_id } => {
            BLE_GATTS_IF.store(u32::from(gatts_if), Ordering::Relaxed);
            BLE_CONN_ID.store(u32::from(conn_id), Ordering::Relaxed);
            BLE_CONNECTED.store(true, Ordering::Release);
            info!("BLE GATTS: client connected (conn_id={})", conn_id);
            if let Some(ingress) = ingress() {
                ingress.on_connection_event(true);
            }
        }
        GattEvent::Disconnect => {
            BLE_CONNECTED.store(false, Ordering::Release);
            BLE_GATTS_IF.store(GATT_IF_NONE, Ordering::Relaxed);
            info!("BLE GATTS: client disconnected");
            if let Some(ingress) = ingress() {
                ingress.on_connection_event(false);
            }
        }
        GattEvent::Mtu(mtu) => {
            if let Some(ingress) = ingress() {
                ingress.on_mtu_changed(mtu);
            }
        }
        GattEvent::Write { handle, data } => {
            if u32::from(handle) != BLE_RX_HANDLE.load(Ordering::Relaxed) {
                debug!("BLE GATTS: write to handle {} ignored", handle);
                return;
            }
            if let Some(ingress) = ingress() {
                ingress.on_raw_chunk(data);
            }
        }
    }
}

/// Handle of the characteristic the peer writes to (0 until registered).
pub fn rx_handle() -> u16 {
    BLE_RX_HANDLE.load(Ordering::Relaxed) as u16
}

pub fn tx_handle() -> u16 {
    BLE_TX_HANDLE.load(Ordering::Relaxed) as u16
}

fn clear_handles() {
    BLE_CONNECTED.store(false, Ordering::Release);
    BLE_GATTS_IF.store(GATT_IF_NONE, Ordering::Relaxed);
    BLE_CONN_ID.store(0, Ordering::Relaxed);
    BLE_SVC_HANDLE.store(0, Ordering::Relaxed);
    BLE_RX_HANDLE.store(0, Ordering::Relaxed);
    BLE_TX_HANDLE.store(0, Ordering::Relaxed);
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF callbacks
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_line_char(svc_handle: u16, uuid: u128) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
            (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe fn add_cccd(svc_handle: u16) {
    use esp_idf_svc::sys::*;
    let mut descr_uuid = uuid16_to_esp(CCCD_UUID);
    unsafe {
        esp_ble_gatts_add_char_descr(
            svc_handle,
            &mut descr_uuid,
            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: ADV_INTERVAL_MIN,
        adv_int_max: ADV_INTERVAL_MAX,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    let ret = unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
    if ret != ESP_OK as i32 {
        warn!("BLE GAP: start advertising failed ({})", ret);
    }
}

// Bluedroid deep-copies the advertising payload, so stack buffers are fine.
#[cfg(target_os = "espidf")]
unsafe fn config_adv_data() {
    use esp_idf_svc::sys::*;
    let mut service_uuid = SERVICE_UUID.to_le_bytes();
    let mut manufacturer = MANUFACTURER_DATA;
    let mut adv_data = esp_ble_adv_data_t {
        set_scan_rsp: false,
        include_name: true,
        include_txpower: true,
        min_interval: 0x20,
        max_interval: 0x40,
        manufacturer_len: manufacturer.len() as u16,
        p_manufacturer_data: manufacturer.as_mut_ptr(),
        service_uuid_len: service_uuid.len() as u16,
        p_service_uuid: service_uuid.as_mut_ptr(),
        flag: (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8,
        ..unsafe { core::mem::zeroed() }
    };
    let ret = unsafe { esp_ble_gap_config_adv_data(&mut adv_data) };
    if ret != ESP_OK as i32 {
        warn!("BLE GAP: config adv data failed ({})", ret);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => unsafe {
            start_advertising();
        },
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            info!("BLE GATTS: app registered (if={})", gatts_if);
            BLE_GATTS_IF.store(u32::from(gatts_if), Ordering::Relaxed);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            unsafe {
                config_adv_data();
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, SERVICE_HANDLES);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), Ordering::Relaxed);
            info!("BLE GATTS: service created (handle={})", svc_handle);
            BLE_CHAR_STEP.store(1, Ordering::Relaxed);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                add_line_char(svc_handle, CHAR_RX_UUID);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let svc_handle = BLE_SVC_HANDLE.load(Ordering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(Ordering::Relaxed) {
                1 => {
                    BLE_RX_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    info!("BLE GATTS: RX char (handle={})", handle);
                    BLE_CHAR_STEP.store(2, Ordering::Relaxed);
                    unsafe { add_cccd(svc_handle) };
                }
                3 => {
                    BLE_TX_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                    info!("BLE GATTS: TX char (handle={})", handle);
                    BLE_CHAR_STEP.store(4, Ordering::Relaxed);
                    unsafe { add_cccd(svc_handle) };
                }
                step => warn!("BLE GATTS: unexpected char at step {}", step),
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let svc_handle = BLE_SVC_HANDLE.load(Ordering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(Ordering::Relaxed) {
                2 => {
                    BLE_CHAR_STEP.store(3, Ordering::Relaxed);
                    unsafe { add_line_char(svc_handle, CHAR_TX_UUID) };
                }
                4 => {
                    BLE_CHAR_STEP.store(5, Ordering::Relaxed);
                    info!("BLE GATTS: service ready");
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            route_event(GattEvent::Connect { gatts_if, conn_id });
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            route_event(GattEvent::Disconnect);
            unsafe { start_advertising() };
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            let mtu = unsafe { (*param).mtu.mtu };
            route_event(GattEvent::Mtu(mtu));
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if p.need_rsp {
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        esp_gatt_status_t_ESP_GATT_OK,
                        core::ptr::null_mut(),
                    );
                }
            }
            if p.is_prep || p.value.is_null() {
                return;
            }
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
            route_event(GattEvent::Write {
                handle: p.handle,
                data,
            });
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Stack adapter
// ───────────────────────────────────────────────────────────────

/// The one Bluedroid GATT server. The statics above allow a single
/// instance per process.
#[derive(Debug, Default)]
pub struct BluedroidStack {
    started: bool,
}

impl BluedroidStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, device_name: &str) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;

        fn check(step: &'static str, ret: i32) -> Result<(), LinkError> {
            if ret == ESP_OK as i32 {
                Ok(())
            } else {
                log::error!("BLE: {} failed ({})", step, ret);
                Err(LinkError::StackInit(step, ret))
            }
        }

        let name = std::ffi::CString::new(device_name)
            .map_err(|_| LinkError::StackInit("device_name", ESP_ERR_INVALID_ARG as i32))?;

        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
            check(
                "bt_controller_enable",
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
            )?;
            check("bluedroid_init", esp_bluedroid_init())?;
            check("bluedroid_enable", esp_bluedroid_enable())?;
            check("set_device_name", esp_ble_gap_set_device_name(name.as_ptr()))?;

            check(
                "gap_register_callback",
                esp_ble_gap_register_callback(Some(ble_gap_event_handler)),
            )?;
            check(
                "gatts_register_callback",
                esp_ble_gatts_register_callback(Some(ble_gatts_event_handler)),
            )?;
            check("gatts_app_register", esp_ble_gatts_app_register(0))?;
        }

        info!("BLE(espidf): Bluedroid stack up, advertising as '{}'", device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, device_name: &str) -> Result<(), LinkError> {
        BLE_RX_HANDLE.store(u32::from(SIM_RX_HANDLE), Ordering::Relaxed);
        BLE_TX_HANDLE.store(u32::from(SIM_TX_HANDLE), Ordering::Relaxed);
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        BLE_CHAR_STEP.store(0, Ordering::Relaxed);
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): stopped");
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, fragment: &[u8]) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        let gatts_if = BLE_GATTS_IF.load(Ordering::Relaxed) as u8;
        let conn_id = BLE_CONN_ID.load(Ordering::Relaxed) as u16;
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                gatts_if,
                conn_id,
                tx_handle(),
                fragment.len() as u16,
                fragment.as_ptr() as *mut u8,
                false,
            )
        };
        if ret == ESP_OK as i32 {
            Ok(())
        } else {
            Err(LinkError::Notify(ret))
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, fragment: &[u8]) -> Result<(), LinkError> {
        debug!("BLE(sim): notify {} bytes", fragment.len());
        Ok(())
    }
}

impl NotifyPort for BluedroidStack {
    fn notify(&mut self, fragment: &[u8]) -> Result<(), LinkError> {
        if !self.started
            || !BLE_CONNECTED.load(Ordering::Acquire)
            || BLE_GATTS_IF.load(Ordering::Relaxed) == GATT_IF_NONE
        {
            return Err(LinkError::NotConnected);
        }
        self.platform_notify(fragment)
    }
}

impl BleStack for BluedroidStack {
    fn start(&mut self, device_name: &str, ingress: LinkIngress) -> Result<(), LinkError> {
        if self.started {
            return Err(LinkError::AlreadyInitialized);
        }
        clear_handles();
        set_ingress(Some(ingress));
        if let Err(e) = self.platform_start(device_name) {
            set_ingress(None);
            return Err(e);
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.started {
            return;
        }
        set_ingress(None);
        self.platform_stop();
        clear_handles();
        self.started = false;
    }
}

impl Drop for BluedroidStack {
    fn drop(&mut self) {
        self.stop();
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
