//! Fuzz target: `MessageRouter::route`
//!
//! Arbitrary lines must be either routed or rejected with a coded error,
//! never panic.
//!
//! cargo fuzz run fuzz_message_router

#![no_main]

use std::sync::{Arc, OnceLock};

use blelink::adapters::device_id::MacAddress;
use blelink::app::ports::{ChipInfo, DevicePort};
use blelink::app::router::MessageRouter;
use blelink::app::session::{AppSession, LogControl};
use blelink::config::AppConfig;
use blelink::sensors::POWER_SENSE;
use libfuzzer_sys::fuzz_target;

struct Board;

impl DevicePort for Board {
    fn chip_info(&self) -> ChipInfo {
        ChipInfo {
            model: 1,
            revision: 3,
            cores: 2,
            unicore: false,
            idf_version: heapless::String::new(),
        }
    }
    fn mac_address(&self) -> MacAddress {
        MacAddress::default()
    }
    fn free_heap(&self) -> u32 {
        0
    }
    fn vdd33(&self) -> i32 {
        0
    }
    fn sample_vbat(&self) -> u16 {
        0
    }
    fn toggle_status_led(&self) {}
}

fn router() -> &'static MessageRouter {
    static ROUTER: OnceLock<MessageRouter> = OnceLock::new();
    ROUTER.get_or_init(|| {
        let cfg = AppConfig {
            has_battery: true,
            ..AppConfig::default()
        };
        MessageRouter::new(
            cfg,
            Arc::new(AppSession::new()),
            Arc::new(LogControl::new()),
            &POWER_SENSE,
            Arc::new(Board),
            "fuzz",
        )
    })
}

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    match router().route(&line) {
        Ok(reply) => {
            if let Some(response) = reply.response {
                assert!(!response.starts_with("-1:"));
            }
        }
        Err(e) => assert!(!e.to_string().is_empty()),
    }
});
