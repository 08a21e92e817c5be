//! Chunked sender: one outbound message in, MTU-bounded notifications out.
//!
//! Fragments carry no header: the peer runs the same `\n` framing as
//! [`LineFramer`](super::framer::LineFramer), so concatenating the
//! fragments in order is all the reassembly it needs.
//!
//! ```text
//!  "11:FMEM:123456\n11:VDD33:3300"  +  '\n'
//!   ├── max_fragment ──┤├── max_fragment ──┤├─ rest ─┤
//!        notify #1           notify #2       notify #3
//! ```

use std::borrow::Cow;

use log::{debug, error, trace};

use super::LinkError;
use super::line::Escaped;
use super::state::ConnectionState;

/// Characteristic value limit minus a small margin.
pub const DEFAULT_SEND_CEILING: usize = 180;

/// The vendor notify primitive. One call hands one fragment to the stack.
pub trait NotifyPort: Send {
    fn notify(&mut self, fragment: &[u8]) -> Result<(), LinkError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkedSender {
    ceiling: usize,
}

impl ChunkedSender {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    /// Largest fragment allowed right now.
    pub fn max_fragment(&self, state: &ConnectionState) -> usize {
        self.ceiling.min(state.mtu_payload())
    }

    /// Send `message` as a single line, appending `\n` when missing.
    ///
    /// Fragments go out strictly in order and synchronously; the first
    /// notify failure aborts the rest. Returns the number of fragments
    /// handed to the stack.
    pub fn send<N>(
        &self,
        state: &ConnectionState,
        port: &mut N,
        message: &str,
    ) -> Result<usize, LinkError>
    where
        N: NotifyPort + ?Sized,
    {
        if !state.is_connected() {
            error!("LINK: send while not connected, dropping {} bytes", message.len());
            return Err(LinkError::NotConnected);
        }
        if message.is_empty() {
            debug!("LINK: empty message, nothing to send");
            return Ok(0);
        }

        let framed: Cow<'_, str> = if message.ends_with('\n') {
            Cow::Borrowed(message)
        } else {
            Cow::Owned(format!("{message}\n"))
        };

        let max = self.max_fragment(state);
        debug!(
            "LINK: send {} bytes (fragment <= {}): {}",
            framed.len(),
            max,
            Escaped(framed.as_bytes())
        );

        let mut sent = 0;
        for fragment in framed.as_bytes().chunks(max) {
            if let Err(e) = port.notify(fragment) {
                error!("LINK: notify failed after {} fragments: {}", sent, e);
                return Err(e);
            }
            sent += 1;
            trace!("LINK: fragment {} ({} bytes)", sent, fragment.len());
        }

        Ok(sent)
    }
}

impl Default for ChunkedSender {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_CEILING)
    }
}

// ── Tests ────────────────────────────────────────────────────
