//! Completed protocol lines and log-friendly escaping.
//!
//! A [`Line`] is one `<code>:<payload…>` message with the `\n` terminator
//! and any `\r` already stripped. Storage is fixed-capacity so a line can
//! move through the dispatcher queue without touching the heap.

use core::fmt;
use std::borrow::Cow;

/// Hard upper bound on a single line, terminator excluded.
pub const LINE_CAPACITY: usize = 350;

/// One complete, immutable protocol line.
#[derive(Clone, PartialEq, Eq)]
pub struct Line {
    bytes: heapless::Vec<u8, LINE_CAPACITY>,
}

impl Line {
    /// Build a line from raw bytes. Bytes beyond [`LINE_CAPACITY`] are cut.
    pub fn new(bytes: &[u8]) -> Self {
        let len = bytes.len().min(LINE_CAPACITY);
        let mut buf = heapless::Vec::new();
        // Cannot fail: `len` is clamped to the capacity.
        let _ = buf.extend_from_slice(&bytes[..len]);
        Self { bytes: buf }
    }

    pub(crate) fn from_buffer(bytes: heapless::Vec<u8, LINE_CAPACITY>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The line as text. Invalid UTF-8 is replaced, never rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line(\"{}\")", Escaped(&self.bytes))
    }
}

// ── Escaped ──────────────────────────────────────────────────

/// Display adapter that renders `\r`, `\n` and `\t` as visible escapes,
/// so payloads can be logged on a single console line.
pub struct Escaped<'a>(pub &'a [u8]);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.0.utf8_chunks() {
            for c in chunk.valid().chars() {
                match c {
                    '\r' => f.write_str("\\r")?,
                    '\n' => f.write_str("\\n")?,
                    '\t' => f.write_str("\\t")?,
                    c => fmt::Write::write_char(f, c)?,
                }
            }
            for b in chunk.invalid() {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}
