//! Event dispatcher: moves connection and line events from the BLE stack
//! context to the application callbacks.
//!
//! ```text
//!  Bluedroid task                      link-events worker (App core)
//!  ──────────────                      ─────────────────────────────
//!  on_connection_event ─┐
//!  on_line_ready ───────┤  Deferred   ┌───────────────┐
//!                       ├────────────▶│ Channel (N=3) │──▶ deliver ──▶ LinkCallbacks
//!                       │  (blocks    └───────────────┘
//!                       │   when full)
//!                       └─ Inline ──────────────────────▶ deliver ──▶ LinkCallbacks
//! ```
//!
//! Both shapes run the same `deliver` step, so the application sees exactly
//! one `on_connect`/`on_disconnect` per real transition and every line once,
//! in arrival order.
//!
//! Every line is tagged with the connection epoch it was framed in. A
//! connect signal bumps the epoch on the producer side, so any line still
//! sitting in the queue from an earlier session is dropped by the worker
//! instead of reaching the new session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future::block_on;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::LinkError;
use super::line::{Escaped, Line};
use super::state::ConnectionState;
use crate::config::WorkerConfig;
use crate::drivers::task_pin;

/// Depth of the deferred event queue.
pub const EVENT_QUEUE_DEPTH: usize = 3;

/// Callbacks implemented by the application layer.
pub trait LinkCallbacks: Send + Sync {
    fn on_connect(&self);
    fn on_disconnect(&self);
    fn on_receive(&self, line: Line);
}

/// Where the callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Directly on the BLE stack's delivery context.
    Inline,
    /// On a dedicated worker thread behind a bounded queue.
    #[default]
    Deferred,
}

/// An event crossing from the stack context to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    ConnectionChanged(bool),
    LineReceived(Line),
}

enum Envelope {
    Event { event: PendingEvent, epoch: u32 },
    Stop,
}

type EventQueue = Channel<CriticalSectionRawMutex, Envelope, EVENT_QUEUE_DEPTH>;

// ── Delivery ─────────────────────────────────────────────────

struct Delivery {
    state: Arc<ConnectionState>,
    callbacks: Arc<dyn LinkCallbacks>,
}

impl Delivery {
    fn deliver(&self, event: PendingEvent, epoch: u32) {
        match event {
            PendingEvent::ConnectionChanged(true) => {
                if self.state.set_connected(true) {
                    info!("LINK: peer connected (epoch {})", epoch);
                    self.callbacks.on_connect();
                } else {
                    debug!("LINK: duplicate connect ignored");
                }
            }
            PendingEvent::ConnectionChanged(false) => {
                if self.state.set_connected(false) {
                    info!("LINK: peer disconnected");
                    self.callbacks.on_disconnect();
                } else {
                    debug!("LINK: duplicate disconnect ignored");
                }
            }
            PendingEvent::LineReceived(line) => {
                if epoch != self.state.epoch() {
                    warn!(
                        "LINK: dropping line from previous session: {}",
                        Escaped(line.as_bytes())
                    );
                    return;
                }
                if !self.state.is_connected() {
                    warn!("LINK: dropping line received while disconnected");
                    return;
                }
                self.callbacks.on_receive(line);
            }
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────

pub struct Dispatcher {
    delivery: Arc<Delivery>,
    queue: Option<Arc<EventQueue>>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Build a dispatcher. In [`DispatchMode::Deferred`] this spawns the
    /// worker thread immediately.
    pub fn new(
        mode: DispatchMode,
        worker: &WorkerConfig,
        state: Arc<ConnectionState>,
        callbacks: Arc<dyn LinkCallbacks>,
    ) -> Result<Self, LinkError> {
        let delivery = Arc::new(Delivery { state, callbacks });

        let (queue, handle) = match mode {
            DispatchMode::Inline => (None, None),
            DispatchMode::Deferred => {
                let queue: Arc<EventQueue> = Arc::new(Channel::new());
                let q = queue.clone();
                let d = delivery.clone();
                let handle = task_pin::spawn_on_core(
                    worker.core,
                    worker.priority,
                    worker.stack_kb,
                    "link-events\0",
                    move || run_worker(&q, &d),
                )
                .map_err(|e| {
                    error!("LINK: event worker spawn failed: {}", e);
                    LinkError::WorkerSpawn
                })?;
                (Some(queue), Some(handle))
            }
        };

        Ok(Self {
            delivery,
            queue,
            running: AtomicBool::new(true),
            worker: Mutex::new(handle),
        })
    }

    pub fn mode(&self) -> DispatchMode {
        if self.queue.is_some() {
            DispatchMode::Deferred
        } else {
            DispatchMode::Inline
        }
    }

    /// Connection signal from the stack. A connect opens a new epoch.
    pub fn on_connection_event(&self, connected: bool) {
        let epoch = if connected {
            self.delivery.state.next_epoch()
        } else {
            self.delivery.state.epoch()
        };
        self.submit(PendingEvent::ConnectionChanged(connected), epoch);
    }

    /// A complete line from the framer.
    pub fn on_line_ready(&self, line: Line) {
        let epoch = self.delivery.state.epoch();
        self.submit(PendingEvent::LineReceived(line), epoch);
    }

    fn submit(&self, event: PendingEvent, epoch: u32) {
        if !self.running.load(Ordering::Acquire) {
            warn!("LINK: dispatcher stopped, dropping {:?}", event);
            return;
        }

        let Some(queue) = &self.queue else {
            self.delivery.deliver(event, epoch);
            return;
        };

        // Back-pressure: the producer waits for a free slot, nothing is dropped.
        block_on(queue.send(Envelope::Event { event, epoch }));
    }

    /// Stop the worker after it drains everything already queued.
    pub fn finalize(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(queue) = &self.queue else {
            return;
        };

        block_on(queue.send(Envelope::Stop));

        let handle = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                // Called from a callback; the worker exits on its own.
                return;
            }
            if handle.join().is_err() {
                error!("LINK: event worker panicked");
            }
        }
        info!("LINK: dispatcher finalized");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn run_worker(queue: &EventQueue, delivery: &Delivery) {
    info!("LINK: event worker started");
    block_on(async {
        loop {
            match queue.receive().await {
                Envelope::Event { event, epoch } => delivery.deliver(event, epoch),
                Envelope::Stop => break,
            }
        }
    });
    info!("LINK: event worker stopped");
}

// ── Tests ────────────────────────────────────────────────────
