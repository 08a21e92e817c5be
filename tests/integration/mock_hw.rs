//! Mock board and BLE stack for integration tests.
//!
//! The stack records every notification and keeps the ingress it was
//! started with, so tests play the part of the vendor stack: they push
//! raw chunks and connection events in and read fragments back out.

use blelink::adapters::device_id::MacAddress;
use blelink::app::callbacks::AppCallbacks;
use blelink::app::ports::{ChipInfo, DevicePort, SystemPort};
use blelink::app::router::MessageRouter;
use blelink::app::session::{AppSession, LogControl};
use blelink::config::{AppConfig, LinkConfig};
use blelink::link::{
    BleServer, BleStack, Clock, DispatchMode, Line, LinkCallbacks, LinkError, LinkHandle,
    LinkIngress, NotifyPort,
};
use blelink::power::PowerManager;
use blelink::sensors::{EnergyMonitor, PowerSense};
use blelink::supervisor::{ActionSlot, Supervisor, SupervisorContext};
use core::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── BLE stack ─────────────────────────────────────────────────

/// Shared view into a [`MockStack`] after it moved into the server.
#[derive(Clone, Default)]
pub struct StackTap {
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub ingress: Arc<Mutex<Option<LinkIngress>>>,
    pub started: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
    pub fail_notify: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl StackTap {
    pub fn ingress(&self) -> LinkIngress {
        self.ingress
            .lock()
            .unwrap()
            .clone()
            .expect("stack not started")
    }

    /// Everything notified so far, concatenated.
    pub fn output(&self) -> String {
        let sent = self.sent.lock().unwrap();
        String::from_utf8(sent.concat()).unwrap()
    }

    pub fn fragments(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

pub struct MockStack {
    tap: StackTap,
}

impl MockStack {
    pub fn new() -> (Self, StackTap) {
        let tap = StackTap::default();
        (
            Self {
                tap: tap.clone(),
            },
            tap,
        )
    }
}

impl NotifyPort for MockStack {
    fn notify(&mut self, fragment: &[u8]) -> Result<(), LinkError> {
        if self.tap.fail_notify.load(Ordering::SeqCst) {
            return Err(LinkError::Notify(-1));
        }
        self.tap.sent.lock().unwrap().push(fragment.to_vec());
        Ok(())
    }
}

impl BleStack for MockStack {
    fn start(&mut self, _device_name: &str, ingress: LinkIngress) -> Result<(), LinkError> {
        *self.tap.ingress.lock().unwrap() = Some(ingress);
        self.tap.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        *self.tap.ingress.lock().unwrap() = None;
        self.tap.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock(AtomicU32);

#[allow(dead_code)]
impl ManualClock {
    pub fn advance(&self, ms: u32) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Line recorder ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordedLines {
    pub lines: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

#[allow(dead_code)]
impl RecordedLines {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LinkCallbacks for RecordedLines {
    fn on_connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }
    fn on_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
    fn on_receive(&self, line: Line) {
        self.lines.lock().unwrap().push(line.text().into_owned());
    }
}

// ── Board ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDevice {
    pub vbat: AtomicU16,
    pub led_toggles: AtomicUsize,
    pub divider_on: AtomicBool,
}

impl DevicePort for MockDevice {
    fn chip_info(&self) -> ChipInfo {
        let mut idf_version = heapless::String::new();
        let _ = idf_version.push_str("v5.2.2");
        ChipInfo {
            model: 1,
            revision: 1,
            cores: 2,
            unicore: false,
            idf_version,
        }
    }
    fn mac_address(&self) -> MacAddress {
        MacAddress([0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56])
    }
    fn free_heap(&self) -> u32 {
        180_000
    }
    fn vdd33(&self) -> i32 {
        3290
    }
    fn sample_vbat(&self) -> u16 {
        self.vbat.load(Ordering::SeqCst)
    }
    fn vbat_divider(&self, enabled: bool) {
        self.divider_on.store(enabled, Ordering::SeqCst);
    }
    fn toggle_status_led(&self) {
        self.led_toggles.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysCall {
    Delay(u32),
    Restart,
    DeepSleep,
    DisableButton,
    Shutdown,
}

#[derive(Default)]
pub struct MockSystem {
    pub calls: Mutex<Vec<SysCall>>,
}

#[allow(dead_code)]
impl MockSystem {
    pub fn calls(&self) -> Vec<SysCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SystemPort for MockSystem {
    fn delay_ms(&self, ms: u32) {
        self.calls.lock().unwrap().push(SysCall::Delay(ms));
    }
    fn restart(&self) {
        self.calls.lock().unwrap().push(SysCall::Restart);
    }
    fn deep_sleep(&self) {
        self.calls.lock().unwrap().push(SysCall::DeepSleep);
    }
    fn disable_standby_button(&self) {
        self.calls.lock().unwrap().push(SysCall::DisableButton);
    }
    fn shutdown_peripherals(&self) {
        self.calls.lock().unwrap().push(SysCall::Shutdown);
    }
}

/// Standby button released from the start.
pub struct ReleasedButton;

impl embedded_hal::digital::ErrorType for ReleasedButton {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for ReleasedButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }
}

// ── Full rig ──────────────────────────────────────────────────

pub fn inline_link() -> LinkConfig {
    LinkConfig {
        dispatch: DispatchMode::Inline,
        ..LinkConfig::default()
    }
}

/// App callbacks wired to a mock stack and board, inline dispatch.
pub struct Rig {
    pub server: BleServer,
    pub link: LinkHandle,
    pub tap: StackTap,
    pub clock: Arc<ManualClock>,
    pub session: Arc<AppSession>,
    pub log: Arc<LogControl>,
    pub energy: Arc<EnergyMonitor>,
    pub sense: &'static PowerSense,
    pub device: Arc<MockDevice>,
    pub system: Arc<MockSystem>,
    pub actions: &'static ActionSlot,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(cfg: AppConfig) -> Self {
        let (stack, tap) = MockStack::new();
        let clock = Arc::new(ManualClock::default());
        let mut server = BleServer::new(inline_link(), stack, clock.clone());
        let link = server.handle();

        let session = Arc::new(AppSession::new());
        let log = Arc::new(LogControl::new());
        let energy = Arc::new(EnergyMonitor::new(cfg.vbat_change_threshold));
        let sense: &'static PowerSense = Box::leak(Box::new(PowerSense::new()));
        let actions: &'static ActionSlot = Box::leak(Box::new(ActionSlot::new()));
        let device = Arc::new(MockDevice::default());
        let system = Arc::new(MockSystem::default());

        let router = MessageRouter::new(
            cfg,
            session.clone(),
            log.clone(),
            sense,
            device.clone(),
            "Esp32_Device_3456",
        );
        let callbacks = AppCallbacks::new(
            router,
            session.clone(),
            log.clone(),
            energy.clone(),
            sense,
            link.clone(),
            system.clone(),
            actions,
        );
        server
            .initialize("Esp32_Device_3456", Arc::new(callbacks))
            .unwrap();

        Self {
            server,
            link,
            tap,
            clock,
            session,
            log,
            energy,
            sense,
            device,
            system,
            actions,
        }
    }

    pub fn connect(&self) {
        self.tap.ingress().on_connection_event(true);
    }

    pub fn disconnect(&self) {
        self.tap.ingress().on_connection_event(false);
    }

    /// Move the server into a supervisor. The rig keeps an unstarted
    /// stand-in so its other views stay usable.
    pub fn supervisor(
        &mut self,
        cfg: AppConfig,
        button: Option<ReleasedButton>,
    ) -> Supervisor<ReleasedButton> {
        let (stack, _) = MockStack::new();
        let spare = BleServer::new(inline_link(), stack, self.clock.clone());
        let server = std::mem::replace(&mut self.server, spare);
        let system: Arc<dyn SystemPort> = self.system.clone();
        let ctx = SupervisorContext {
            session: self.session.clone(),
            log: self.log.clone(),
            energy: self.energy.clone(),
            sense: self.sense,
            device: self.device.clone(),
            actions: self.actions,
        };
        Supervisor::new(cfg, ctx, PowerManager::new(system, server, button))
    }

    /// Write `text` as one chunk and return what the board sent back.
    pub fn exchange(&self, text: &str) -> String {
        self.tap.clear();
        self.tap.ingress().on_raw_chunk(text.as_bytes());
        self.tap.output()
    }
}
