//! BleLink firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BluedroidStack     EspDevice      EspSystem      Esp32Clock   │
//! │  (BleStack+Notify)  (DevicePort)   (SystemPort)   (Clock)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  BleServer: framer · dispatcher · chunked sender       │    │
//! │  │  AppCallbacks ─▶ MessageRouter                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Supervisor (1 Hz, main thread) · PowerManager (standby)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use blelink::adapters::ble::BluedroidStack;
use blelink::adapters::device_id;
use blelink::adapters::hardware::{EspDevice, EspSystem};
use blelink::adapters::time::Esp32Clock;
use blelink::app::callbacks::AppCallbacks;
use blelink::app::ports::{DevicePort, SystemPort};
use blelink::app::router::MessageRouter;
use blelink::app::session::{AppSession, LogControl};
use blelink::config::{AppConfig, SystemConfig};
use blelink::drivers::gpio_isr;
use blelink::drivers::hw_init::{self, RawInputPin};
use blelink::link::BleServer;
use blelink::pins;
use blelink::power::PowerManager;
use blelink::sensors::{EnergyMonitor, POWER_SENSE};
use blelink::supervisor::{ACTIONS, Supervisor, SupervisorContext};

/// Build-time board override, e.g.
/// `BLELINK_CONFIG='{"app":{"has_battery":true}}' cargo build`.
fn load_config() -> SystemConfig {
    match option_env!("BLELINK_CONFIG") {
        Some(json) => SystemConfig::from_json(json).unwrap_or_else(|e| {
            warn!("Config override rejected ({}), using defaults", e);
            SystemConfig::default()
        }),
        None => SystemConfig::default(),
    }
}

/// GPIO and ADC setup. A missing ISR service only costs the button and
/// power-sense interrupts, so it is logged and boot continues.
fn init_board(cfg: &AppConfig) -> blelink::error::Result<()> {
    hw_init::init_peripherals(cfg)?;
    match hw_init::init_isr_service(cfg) {
        Ok(()) => {
            if let Err(e) = gpio_isr::spawn_wake_relay(&ACTIONS) {
                log::error!("ISR wake relay spawn failed: {}, ISR posts wait for the next tick", e);
            }
        }
        Err(e) => log::error!("ISR service init failed: {}, continuing without ISRs", e),
    }
    Ok(())
}

fn start_link(
    server: &mut BleServer,
    device_name: &str,
    callbacks: Arc<AppCallbacks>,
) -> blelink::error::Result<()> {
    server.initialize(device_name, callbacks)?;
    Ok(())
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    log::set_max_level(log::LevelFilter::Info);

    info!("╔══════════════════════════════════════╗");
    info!("║  BleLink v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config();
    let app_cfg = config.app.clone();

    // ── 2. Peripherals ────────────────────────────────────────
    init_board(&app_cfg)?;

    // ── 3. Shared state and board adapters ────────────────────
    let session = Arc::new(AppSession::new());
    let log_control = Arc::new(LogControl::new());
    let energy = Arc::new(EnergyMonitor::new(app_cfg.vbat_change_threshold));
    let device: Arc<dyn DevicePort> = Arc::new(EspDevice::new());
    let system: Arc<dyn SystemPort> = Arc::new(EspSystem::new(app_cfg.clone()));

    let device_name = device_id::device_name(&app_cfg.device_name, &device.mac_address());
    info!("Device name: {}", device_name);

    // ── 4. BLE link ───────────────────────────────────────────
    let mut server = BleServer::new(
        config.link.clone(),
        BluedroidStack::new(),
        Arc::new(Esp32Clock::new()),
    );

    let router = MessageRouter::new(
        app_cfg.clone(),
        session.clone(),
        log_control.clone(),
        &POWER_SENSE,
        device.clone(),
        device_name.as_str(),
    );
    let callbacks = Arc::new(AppCallbacks::new(
        router,
        session.clone(),
        log_control.clone(),
        energy.clone(),
        &POWER_SENSE,
        server.handle(),
        system.clone(),
        &ACTIONS,
    ));
    start_link(&mut server, &device_name, callbacks)?;

    // ── 5. Supervisor (never returns) ─────────────────────────
    let button = app_cfg
        .has_standby
        .then_some(RawInputPin(pins::BUTTON_STANDBY_GPIO));
    let power = PowerManager::new(system, server, button);
    let ctx = SupervisorContext {
        session,
        log: log_control,
        energy,
        sense: &POWER_SENSE,
        device,
        actions: &ACTIONS,
    };

    info!("Boot complete, supervisor running");
    Supervisor::new(app_cfg, ctx, power).run()
}
