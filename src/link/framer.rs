//! Transport framer: raw GATT write chunks in, complete lines out.
//!
//! The peer writes an arbitrary byte stream in MTU-sized pieces; only
//! `\n` carries meaning. Chunk boundaries are ignored entirely.
//!
//! ```text
//!  chunk "01:v1:Y:N\n02:"   chunk "foo\n"
//!        │                        │
//!        ▼                        ▼
//!  ┌───────────────────────────────────────┐
//!  │ LineBuffer  (≤ max_line_len bytes)    │──▶ Line("01:v1:Y:N")
//!  │ '\r' dropped · '\n' completes         │──▶ Line("02:foo")
//!  └───────────────────────────────────────┘
//! ```
//!
//! A partial line left idle for longer than the receive timeout is
//! discarded before the next chunk is processed, so a peer that stopped
//! mid-line cannot prefix its next message with stale bytes.

use log::{trace, warn};

use super::line::{Escaped, LINE_CAPACITY, Line};
use crate::config::LinkConfig;

pub struct LineFramer {
    buffer: heapless::Vec<u8, LINE_CAPACITY>,
    max_len: usize,
    timeout_ms: u32,
    last_byte_ms: u32,
    overflowed: bool,
}

impl LineFramer {
    /// `max_len` is clamped to [`LINE_CAPACITY`].
    pub fn new(timeout_ms: u32, max_len: usize) -> Self {
        Self {
            buffer: heapless::Vec::new(),
            max_len: max_len.clamp(1, LINE_CAPACITY),
            timeout_ms,
            last_byte_ms: 0,
            overflowed: false,
        }
    }

    pub fn from_config(cfg: &LinkConfig) -> Self {
        Self::new(cfg.recv_timeout_ms, cfg.max_line_len)
    }

    /// Bytes held for the line currently being assembled.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line. Used on every connection transition.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed one raw chunk. Every completed, non-empty line is passed to
    /// `emit` in order. Never blocks.
    pub fn on_raw_chunk(&mut self, bytes: &[u8], now_ms: u32, mut emit: impl FnMut(Line)) {
        if bytes.is_empty() {
            return;
        }

        if !self.buffer.is_empty() && now_ms.wrapping_sub(self.last_byte_ms) > self.timeout_ms {
            warn!(
                "LINK: receive timeout, discarding partial line ({} bytes): {}",
                self.buffer.len(),
                Escaped(&self.buffer)
            );
            self.reset();
        }

        for &b in bytes {
            match b {
                b'\r' => {}
                b'\n' => {
                    if self.buffer.is_empty() {
                        continue;
                    }
                    let line = Line::from_buffer(core::mem::take(&mut self.buffer));
                    self.overflowed = false;
                    trace!("LINK: line complete: {}", Escaped(line.as_bytes()));
                    emit(line);
                }
                _ => self.push_byte(b),
            }
        }

        self.last_byte_ms = now_ms;
    }

    fn push_byte(&mut self, b: u8) {
        if self.buffer.len() < self.max_len && self.buffer.push(b).is_ok() {
            return;
        }
        if !self.overflowed {
            warn!(
                "LINK: line exceeds {} bytes, truncating until next terminator",
                self.max_len
            );
            self.overflowed = true;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
