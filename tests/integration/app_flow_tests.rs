//! Application protocol over the link: handshake, info, errors and the
//! restart/standby requests, all through mock stack and board.

use blelink::config::AppConfig;
use blelink::supervisor::SupervisorAction;

use crate::mock_hw::{Rig, SysCall};

fn battery_board() -> AppConfig {
    AppConfig {
        has_battery: true,
        ..AppConfig::default()
    }
}

#[test]
fn handshake_replies_with_version_and_board_options() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();

    assert_eq!(rig.exchange("01:\n"), "01:0.3.0:N:N\n");
    assert!(rig.session.app_connected());
    assert_eq!(rig.actions.take(), Some(SupervisorAction::ResetTimer));
}

#[test]
fn handshake_on_battery_board_follows_with_energy() {
    let rig = Rig::new(battery_board());
    rig.sense.set_external(true);
    rig.sense.set_vbat(2480);
    rig.connect();

    assert_eq!(rig.exchange("01:\n"), "01:0.3.0:Y:N\n10:EXT:N:2480:\n");
    assert!(rig.log.is_active());
}

#[test]
fn malformed_lines_get_coded_errors() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();

    assert_eq!(
        rig.exchange("1\n"),
        "-1:Message length must have 2 or more characters\n"
    );
    assert_eq!(rig.exchange("abc:1\n"), "-1:Non-numeric message code\n");
    assert_eq!(rig.exchange("00:\n"), "-1:Invalid message code\n");
    assert_eq!(rig.exchange("42:x\n"), "-1:Code of message invalid: 42\n");
}

#[test]
fn energy_code_is_unknown_without_battery() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();
    assert_eq!(rig.exchange("10:\n"), "-1:Code of message invalid: 10\n");

    let rig = Rig::new(battery_board());
    rig.sense.set_vbat(1900);
    rig.connect();
    assert_eq!(rig.exchange("10:\n"), "10:BAT:N:1900:\n");
}

#[test]
fn echo_and_feedback_keepalive() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();

    assert_eq!(rig.exchange("70:hello world\n"), "70:hello world\n");
    assert_eq!(rig.exchange("80:\n"), "80:\n");
}

#[test]
fn info_blocks_use_hash_and_semicolon_separators() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();

    let esp = rig.exchange("11:ESP32\n");
    assert!(esp.starts_with("11:ESP32:*** Chip Info#* Model; 1#* Revision; 1#* Cores; 2#"));
    assert!(esp.contains("#* ESP-IDF;#  v5.2.2#"));
    assert!(esp.ends_with("#* Mac-address; 24;0A;C4;12;34;56#\n"));

    assert_eq!(rig.exchange("11:FMEM\n"), "11:FMEM:180000\n");
    assert_eq!(rig.exchange("11:VDD33\n"), "11:VDD33:3290\n");
}

#[test]
fn info_all_on_battery_board_appends_energy() {
    let rig = Rig::new(battery_board());
    rig.connect();

    let all = rig.exchange("11:ALL\n");
    assert!(all.starts_with("11:ESP32:"));
    assert!(all.ends_with("11:FMEM:180000\n11:VDD33:3290\n10:BAT:N:0:\n"));
}

#[test]
fn every_reply_counts_as_feedback() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();
    for _ in 0..5 {
        rig.session.tick();
    }
    assert_eq!(rig.session.secs_since_feedback(), 5);

    rig.exchange("80:\n");
    assert_eq!(rig.session.secs_since_feedback(), 0);
    assert_eq!(rig.session.secs_since_received(), 0);
}

#[test]
fn log_control_switches_runtime_logging() {
    let rig = Rig::new(battery_board());
    rig.connect();

    assert_eq!(rig.exchange("71:Y\n"), "");
    assert!(rig.log.is_active());
    rig.exchange("71:N\n");
    assert!(!rig.log.is_active());
    rig.exchange("71:R\n");
    assert!(rig.log.is_active());
}

#[test]
fn restart_waits_for_a_connected_app() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();
    rig.exchange("98:\n");
    assert_eq!(rig.system.calls(), vec![SysCall::Restart]);

    let rig = Rig::new(AppConfig::default());
    rig.connect();
    rig.exchange("01:\n");
    rig.exchange("98:\n");
    assert_eq!(rig.system.calls(), vec![SysCall::Delay(500), SysCall::Restart]);
}

#[test]
fn standby_message_is_handed_to_the_supervisor() {
    let rig = Rig::new(AppConfig {
        has_standby: true,
        ..AppConfig::default()
    });
    rig.connect();
    rig.exchange("99:\n");

    assert_eq!(rig.actions.take(), Some(SupervisorAction::StandbyMessage));
    assert!(rig.system.calls().is_empty());
}

#[test]
fn standby_without_button_restarts() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();
    rig.exchange("99:\n");

    assert_eq!(rig.actions.take(), None);
    assert_eq!(rig.system.calls(), vec![SysCall::Restart]);
}

#[test]
fn disconnect_closes_the_app_session() {
    let rig = Rig::new(AppConfig::default());
    rig.connect();
    rig.exchange("01:\n");
    assert!(rig.session.app_connected());

    rig.disconnect();
    assert!(!rig.session.app_connected());
    assert!(!rig.link.is_connected());
}
