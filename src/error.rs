//! Unified error types for the firmware.
//!
//! Link and peripheral errors convert into [`Error`], so board bring-up and
//! config loading report failures uniformly. Variants are `Copy` and carry no
//! heap data.

use core::fmt;

pub use crate::drivers::hw_init::HwInitError;
pub use crate::link::LinkError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// BLE link failure.
    Link(LinkError),
    /// Peripheral initialisation failed.
    Hw(HwInitError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Hw(e) => write!(f, "hw: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Hw(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
