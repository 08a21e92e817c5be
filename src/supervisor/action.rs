//! Single-slot action mailbox for the supervisor.
//!
//! ```text
//!   button ISR ──post_from_isr──┐
//!   vext ISR   ──post_from_isr──┤
//!                               ▼
//!   link worker ──post──▶  ActionSlot (latest wins) ──take──▶ Supervisor
//!                               │
//!                               └── Signal: wakes the supervisor's wait
//! ```
//!
//! A newer action overwrites an unconsumed older one. ISR posts only store
//! the action; the GPIO wake relay (`drivers::gpio_isr`) then calls
//! [`ActionSlot::wake`] from task context so the supervisor does not sit
//! out the rest of its tick. Without the relay an ISR post is picked up on
//! the next 1 s tick.

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SupervisorAction {
    /// Zero the supervisor clock and activity marks.
    ResetTimer = 1,
    /// Standby button pressed.
    StandbyButton = 2,
    /// Peer asked for standby (`99:`).
    StandbyMessage = 3,
    /// External power sense changed.
    ExternalPowerChanged = 4,
}

impl SupervisorAction {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::ResetTimer),
            2 => Some(Self::StandbyButton),
            3 => Some(Self::StandbyMessage),
            4 => Some(Self::ExternalPowerChanged),
            _ => None,
        }
    }
}

const EMPTY: u8 = 0;

pub struct ActionSlot {
    pending: AtomicU8,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for ActionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionSlot {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(EMPTY),
            wake: Signal::new(),
        }
    }

    /// Post from task context and wake the supervisor.
    pub fn post(&self, action: SupervisorAction) {
        debug!("SUP: action {action:?}");
        self.pending.store(action as u8, Ordering::Release);
        self.wake.signal(());
    }

    /// Post from interrupt context. Lock-free, never wakes a thread.
    pub fn post_from_isr(&self, action: SupervisorAction) {
        self.pending.store(action as u8, Ordering::Release);
    }

    /// Wake the supervisor without posting. Task context only.
    pub fn wake(&self) {
        self.wake.signal(());
    }

    /// Consume the pending action, if any.
    pub fn take(&self) -> Option<SupervisorAction> {
        SupervisorAction::from_u8(self.pending.swap(EMPTY, Ordering::AcqRel))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != EMPTY
    }

    /// Resolves on the next task-context `post`.
    pub async fn wait(&self) {
        self.wake.wait().await;
    }
}

/// Shared slot for ISRs, the link worker and the supervisor.
pub static ACTIONS: ActionSlot = ActionSlot::new();
