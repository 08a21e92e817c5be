//! BLE line link: reassembly, dispatch and chunked send.
//!
//! ```text
//!   Vendor BLE stack (Bluedroid task)
//!     │ GATT write            │ connect / disconnect / MTU
//!     ▼                       ▼
//!  ┌─────────────────────────────────────┐
//!  │ LinkIngress                         │
//!  │   LineFramer ──Line──▶ Dispatcher ──┼──▶ LinkCallbacks (app)
//!  │                     ConnectionState │          │
//!  └─────────────────────────────────────┘          │ responses
//!                                                   ▼
//!                      NotifyPort ◀── ChunkedSender ◀── LinkHandle::send
//! ```
//!
//! The link owns no global state: [`BleServer`] builds one
//! [`ConnectionState`], one framer and one dispatcher and hands out cheap
//! clonable [`LinkIngress`] / [`LinkHandle`] views of them.

pub mod dispatcher;
pub mod framer;
pub mod line;
pub mod sender;
pub mod server;
pub mod state;

pub use dispatcher::{DispatchMode, Dispatcher, EVENT_QUEUE_DEPTH, LinkCallbacks, PendingEvent};
pub use framer::LineFramer;
pub use line::{Escaped, LINE_CAPACITY, Line};
pub use sender::{ChunkedSender, DEFAULT_SEND_CEILING, NotifyPort};
pub use server::{BleServer, BleStack, LinkHandle, LinkIngress};
pub use state::{ATT_HEADER_LEN, ConnectionState, DEFAULT_ATT_MTU};

/// Monotonic millisecond clock. Wraps at `u32::MAX`; all comparisons
/// use wrapping arithmetic.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u32;
}

// ── Error type ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No peer is connected.
    NotConnected,
    /// The stack rejected a notification (ESP-IDF error code).
    Notify(i32),
    /// A vendor stack bring-up step failed.
    StackInit(&'static str, i32),
    /// `initialize` called twice without `finalize`.
    AlreadyInitialized,
    /// The event worker thread could not be created.
    WorkerSpawn,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "BLE: no peer connected"),
            Self::Notify(rc) => write!(f, "BLE: notify failed (rc={})", rc),
            Self::StackInit(step, rc) => write!(f, "BLE: {} failed (rc={})", step, rc),
            Self::AlreadyInitialized => write!(f, "BLE: server already initialized"),
            Self::WorkerSpawn => write!(f, "BLE: event worker spawn failed"),
        }
    }
}

impl std::error::Error for LinkError {}
