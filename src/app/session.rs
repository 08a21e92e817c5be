//! Application session state shared by the link worker and the supervisor.
//!
//! Times are in supervisor seconds (the 1 Hz tick counter), not wall time,
//! so a timer reset from the `01:` handshake restarts every timeout.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{LevelFilter, debug};

#[derive(Debug, Default)]
pub struct AppSession {
    time_seconds: AtomicU32,
    last_feedback: AtomicU32,
    last_received: AtomicU32,
    app_connected: AtomicBool,
}

impl AppSession {
    pub const fn new() -> Self {
        Self {
            time_seconds: AtomicU32::new(0),
            last_feedback: AtomicU32::new(0),
            last_received: AtomicU32::new(0),
            app_connected: AtomicBool::new(false),
        }
    }

    pub fn seconds(&self) -> u32 {
        self.time_seconds.load(Ordering::Relaxed)
    }

    /// Advance one second; returns the new time.
    pub fn tick(&self) -> u32 {
        self.time_seconds.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn mark_feedback(&self) {
        self.last_feedback.store(self.seconds(), Ordering::Relaxed);
    }

    pub fn mark_received(&self) {
        self.last_received.store(self.seconds(), Ordering::Relaxed);
    }

    pub fn secs_since_feedback(&self) -> u32 {
        self.seconds().wrapping_sub(self.last_feedback.load(Ordering::Relaxed))
    }

    pub fn secs_since_received(&self) -> u32 {
        self.seconds().wrapping_sub(self.last_received.load(Ordering::Relaxed))
    }

    /// Zero the clock and both activity marks.
    pub fn reset_timers(&self) {
        self.time_seconds.store(0, Ordering::Relaxed);
        self.last_feedback.store(0, Ordering::Relaxed);
        self.last_received.store(0, Ordering::Relaxed);
        debug!("APP: timers reset");
    }

    /// Back to a fresh session: a saved logging state is restored and the
    /// activity marks cleared. The clock keeps running.
    pub fn reinitialize(&self, log: &LogControl) {
        if log.saved() && !log.is_active() {
            log.activate();
        }
        self.last_feedback.store(0, Ordering::Relaxed);
        self.last_received.store(0, Ordering::Relaxed);
        debug!("APP: initialized");
    }

    /// The app completed the `01:` handshake on this connection.
    pub fn app_connected(&self) -> bool {
        self.app_connected.load(Ordering::Relaxed)
    }

    pub fn set_app_connected(&self, connected: bool) {
        self.app_connected.store(connected, Ordering::Relaxed);
    }
}

// ── Log control ──────────────────────────────────────────────

/// Runtime debug logging switch (message `71`). Active logging lifts the
/// `log` max level to `Trace`; inactive keeps `Info` and above.
#[derive(Debug, Default)]
pub struct LogControl {
    active: AtomicBool,
    saved: AtomicBool,
}

impl LogControl {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            saved: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn saved(&self) -> bool {
        self.saved.load(Ordering::Relaxed)
    }

    pub fn activate(&self) {
        self.set(true);
    }

    pub fn deactivate(&self) {
        self.set(false);
    }

    /// Remember the current state for a later [`restore`](Self::restore).
    pub fn save(&self) {
        self.saved.store(self.is_active(), Ordering::Relaxed);
    }

    pub fn restore(&self) {
        self.set(self.saved());
    }

    fn set(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
        log::set_max_level(if active {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        });
    }
}
