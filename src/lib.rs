//! BleLink firmware library.
//!
//! BLE line-protocol bridge between a mobile app and an ESP32 board.
//! Exposes the link, application and supervisor layers for integration
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.
//!
//! ```text
//!   Bluedroid ─▶ link (framer · dispatcher · sender) ─▶ app (router · callbacks)
//!                                                          │ ActionSlot
//!                                                          ▼
//!                 sensors ◀── supervisor (1 Hz) ──▶ power (standby · restart)
//! ```

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod power;
pub mod supervisor;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;
