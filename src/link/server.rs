//! BLE server lifecycle and the two views handed out to the outside:
//! [`LinkIngress`] for the vendor stack, [`LinkHandle`] for the application.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::{info, warn};

use super::dispatcher::{Dispatcher, LinkCallbacks};
use super::framer::LineFramer;
use super::sender::{ChunkedSender, NotifyPort};
use super::state::ConnectionState;
use super::{Clock, LinkError};
use crate::config::LinkConfig;

/// The vendor BLE stack seam. Service registration, advertising and MTU
/// negotiation live behind it; the link only needs start, stop and notify.
pub trait BleStack: NotifyPort {
    /// Bring the stack up advertising `device_name`. Every stack event is
    /// reported through `ingress` from then on.
    fn start(&mut self, device_name: &str, ingress: LinkIngress) -> Result<(), LinkError>;

    /// Tear the stack down. No ingress calls may follow.
    fn stop(&mut self);
}

type SharedStack = Arc<Mutex<dyn BleStack>>;

// ── Ingress ──────────────────────────────────────────────────

/// Entry points the vendor stack calls from its own task.
#[derive(Clone)]
pub struct LinkIngress {
    inner: Arc<IngressInner>,
}

struct IngressInner {
    framer: Mutex<LineFramer>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<ConnectionState>,
    clock: Arc<dyn Clock>,
}

impl LinkIngress {
    /// One GATT write from the peer.
    pub fn on_raw_chunk(&self, bytes: &[u8]) {
        let now_ms = self.inner.clock.now_ms();
        let mut framer = self.inner.framer.lock().unwrap_or_else(PoisonError::into_inner);
        framer.on_raw_chunk(bytes, now_ms, |line| self.inner.dispatcher.on_line_ready(line));
    }

    /// Peer connected or link lost. Any partial line is dropped either way.
    pub fn on_connection_event(&self, connected: bool) {
        self.inner
            .framer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        if !connected {
            self.inner.state.reset_mtu();
        }
        self.inner.dispatcher.on_connection_event(connected);
    }

    /// The peer negotiated a new ATT MTU.
    pub fn on_mtu_changed(&self, mtu: u16) {
        self.inner.state.set_mtu(mtu);
        info!(
            "BLE: MTU {} (payload {} bytes)",
            self.inner.state.mtu(),
            self.inner.state.mtu_payload()
        );
    }
}

// ── Handle ───────────────────────────────────────────────────

/// Application-side view: send responses, query the connection.
#[derive(Clone)]
pub struct LinkHandle {
    inner: Arc<HandleInner>,
}

type SendHook = Box<dyn Fn() + Send + Sync>;

struct HandleInner {
    state: Arc<ConnectionState>,
    sender: ChunkedSender,
    stack: SharedStack,
    send_hook: OnceLock<SendHook>,
}

impl LinkHandle {
    /// Send one message (or a `\n`-joined block) to the peer. Failures are
    /// logged and swallowed; a disconnected peer simply gets nothing.
    pub fn send(&self, message: &str) {
        let _ = self.try_send(message);
    }

    /// Like [`send`](Self::send) but reports the outcome.
    pub fn try_send(&self, message: &str) -> Result<usize, LinkError> {
        let result = {
            let mut stack = self.inner.stack.lock().unwrap_or_else(PoisonError::into_inner);
            self.inner.sender.send(&self.inner.state, &mut *stack, message)
        };
        if result.is_ok() {
            if let Some(hook) = self.inner.send_hook.get() {
                hook();
            }
        }
        result
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.inner.state
    }

    /// Install a hook run after every successful send. First one wins.
    pub fn set_send_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        if self.inner.send_hook.set(Box::new(hook)).is_err() {
            warn!("LINK: send hook already installed");
        }
    }
}

// ── Server ───────────────────────────────────────────────────

pub struct BleServer {
    config: LinkConfig,
    stack: SharedStack,
    state: Arc<ConnectionState>,
    clock: Arc<dyn Clock>,
    handle: LinkHandle,
    active: Option<LinkIngress>,
}

impl BleServer {
    pub fn new<S: BleStack + 'static>(config: LinkConfig, stack: S, clock: Arc<dyn Clock>) -> Self {
        let stack: SharedStack = Arc::new(Mutex::new(stack));
        let state = Arc::new(ConnectionState::new());
        let handle = LinkHandle {
            inner: Arc::new(HandleInner {
                state: state.clone(),
                sender: ChunkedSender::new(config.send_ceiling),
                stack: stack.clone(),
                send_hook: OnceLock::new(),
            }),
        };
        Self {
            config,
            stack,
            state,
            clock,
            handle,
            active: None,
        }
    }

    /// Handle for sending. Valid before `initialize` and after `finalize`
    /// (sends are then rejected as not connected).
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Start the stack advertising `device_name` and route its events to
    /// `callbacks`. Returns the ingress that was registered with the stack.
    pub fn initialize(
        &mut self,
        device_name: &str,
        callbacks: Arc<dyn LinkCallbacks>,
    ) -> Result<LinkIngress, LinkError> {
        if self.active.is_some() {
            return Err(LinkError::AlreadyInitialized);
        }

        let dispatcher = Arc::new(Dispatcher::new(
            self.config.dispatch,
            &self.config.worker,
            self.state.clone(),
            callbacks,
        )?);
        let ingress = LinkIngress {
            inner: Arc::new(IngressInner {
                framer: Mutex::new(LineFramer::from_config(&self.config)),
                dispatcher: dispatcher.clone(),
                state: self.state.clone(),
                clock: self.clock.clone(),
            }),
        };

        let started = self
            .stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(device_name, ingress.clone());
        if let Err(e) = started {
            dispatcher.finalize();
            return Err(e);
        }

        info!(
            "BLE: server initialized as '{}' ({:?} dispatch)",
            device_name,
            dispatcher.mode()
        );
        self.active = Some(ingress.clone());
        Ok(ingress)
    }

    /// Stop the stack and the dispatcher. A connected peer is reported as
    /// disconnected first. Safe to call more than once.
    pub fn finalize(&mut self) {
        let Some(ingress) = self.active.take() else {
            return;
        };
        self.stack.lock().unwrap_or_else(PoisonError::into_inner).stop();
        ingress.on_connection_event(false);
        ingress.inner.dispatcher.finalize();
        info!("BLE: server finalized");
    }
}

impl Drop for BleServer {
    fn drop(&mut self) {
        self.finalize();
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::dispatcher::DispatchMode;
    use crate::link::line::Line;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeStack {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
        fail_start: bool,
    }

    impl NotifyPort for FakeStack {
        fn notify(&mut self, fragment: &[u8]) -> Result<(), LinkError> {
            self.sent.lock().unwrap().push(fragment.to_vec());
            Ok(())
        }
    }

    impl BleStack for FakeStack {
        fn start(&mut self, _name: &str, _ingress: LinkIngress) -> Result<(), LinkError> {
            if self.fail_start {
                return Err(LinkError::StackInit("bluedroid_init", -1));
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn stop(&mut self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedClock(AtomicU32);

    impl Clock for FixedClock {
        fn now_ms(&self) -> u32 {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl LinkCallbacks for Lines {
        fn on_connect(&self) {}
        fn on_disconnect(&self) {}
        fn on_receive(&self, line: Line) {
            self.0.lock().unwrap().push(line.text().into_owned());
        }
    }

    fn inline_config() -> LinkConfig {
        LinkConfig {
            dispatch: DispatchMode::Inline,
            ..LinkConfig::default()
        }
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let mut server = BleServer::new(inline_config(), FakeStack::default(), clock);
        server.initialize("dev", Arc::new(Lines::default())).unwrap();
        assert!(matches!(
            server.initialize("dev", Arc::new(Lines::default())),
            Err(LinkError::AlreadyInitialized)
        ));
    }

    #[test]
    fn failed_start_leaves_server_uninitialized() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let stack = FakeStack {
            fail_start: true,
            ..FakeStack::default()
        };
        let mut server = BleServer::new(inline_config(), stack, clock);
        assert!(server.initialize("dev", Arc::new(Lines::default())).is_err());
        assert!(!server.is_initialized());
    }

    #[test]
    fn mtu_change_widens_fragments_and_disconnect_restores_default() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let stack = FakeStack::default();
        let sent = stack.sent.clone();
        let mut server = BleServer::new(inline_config(), stack, clock);
        let ingress = server.initialize("dev", Arc::new(Lines::default())).unwrap();
        let link = server.handle();

        ingress.on_connection_event(true);
        ingress.on_mtu_changed(103);
        link.send(&"z".repeat(99));
        assert_eq!(sent.lock().unwrap().len(), 1);

        ingress.on_connection_event(false);
        assert_eq!(link.state().mtu(), crate::link::DEFAULT_ATT_MTU);
    }

    #[test]
    fn send_hook_runs_only_on_success() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let mut server = BleServer::new(inline_config(), FakeStack::default(), clock);
        let ingress = server.initialize("dev", Arc::new(Lines::default())).unwrap();
        let link = server.handle();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        link.set_send_hook(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        link.send("80:");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        ingress.on_connection_event(true);
        link.send("80:");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finalize_stops_stack_once_and_disconnects() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let stack = FakeStack::default();
        let stopped = stack.stopped.clone();
        let mut server = BleServer::new(inline_config(), stack, clock);
        let ingress = server.initialize("dev", Arc::new(Lines::default())).unwrap();
        ingress.on_connection_event(true);
        assert!(server.is_connected());

        server.finalize();
        server.finalize();
        assert!(!server.is_connected());
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeout_uses_injected_clock() {
        let clock = Arc::new(FixedClock(AtomicU32::new(0)));
        let lines = Arc::new(Lines::default());
        let mut server = BleServer::new(inline_config(), FakeStack::default(), clock.clone());
        let ingress = server.initialize("dev", lines.clone()).unwrap();
        ingress.on_connection_event(true);

        ingress.on_raw_chunk(b"70:stale");
        clock.0.store(5_000, Ordering::Relaxed);
        ingress.on_raw_chunk(b"80:\n");
        assert_eq!(*lines.0.lock().unwrap(), vec!["80:".to_string()]);
    }
}
