//! Supervisor ticks and actions against the mock board.

use std::sync::atomic::Ordering;

use blelink::config::AppConfig;
use blelink::supervisor::{Flow, SupervisorAction};

use crate::mock_hw::{ReleasedButton, Rig, SysCall};

fn standby_board(max_inactive_secs: u32) -> AppConfig {
    AppConfig {
        has_standby: true,
        max_inactive_secs: Some(max_inactive_secs),
        ..AppConfig::default()
    }
}

#[test]
fn tick_advances_clock_and_blinks() {
    let cfg = AppConfig::default();
    let mut rig = Rig::new(cfg.clone());
    let mut sup = rig.supervisor(cfg, None);

    for _ in 0..3 {
        assert_eq!(sup.tick(), Flow::Continue);
    }
    assert_eq!(rig.session.seconds(), 3);
    assert_eq!(rig.device.led_toggles.load(Ordering::SeqCst), 3);
}

#[test]
fn idle_board_goes_to_standby() {
    let cfg = standby_board(3);
    let mut rig = Rig::new(cfg.clone());
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    assert_eq!(sup.tick(), Flow::Continue);
    assert_eq!(sup.tick(), Flow::Continue);
    assert_eq!(sup.tick(), Flow::Standby);

    assert_eq!(
        rig.system.calls(),
        vec![
            SysCall::DisableButton,
            SysCall::Shutdown,
            SysCall::Delay(200),
            SysCall::DeepSleep
        ]
    );
    assert_eq!(tap.stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn connected_app_is_told_before_inactivity_standby() {
    let cfg = standby_board(3);
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    rig.exchange("01:\n");
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    // The handshake asked for a timer reset.
    let action = rig.actions.take().unwrap();
    assert!(sup.handle_action(action));

    tap.clear();
    sup.tick();
    sup.tick();
    assert_eq!(sup.tick(), Flow::Standby);

    assert_eq!(tap.output(), "99:Attained maximum time of inactivity\n");
    assert_eq!(rig.system.calls()[..2], [SysCall::DisableButton, SysCall::Delay(500)]);
}

#[test]
fn received_data_postpones_inactivity() {
    let cfg = standby_board(3);
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    sup.tick();
    sup.tick();
    rig.exchange("80:\n");
    assert_eq!(sup.tick(), Flow::Continue);
    assert_eq!(sup.tick(), Flow::Continue);
    assert_eq!(sup.tick(), Flow::Standby);
}

#[test]
fn external_power_suspends_inactivity() {
    let cfg = AppConfig {
        has_battery: true,
        ..standby_board(2)
    };
    let mut rig = Rig::new(cfg.clone());
    rig.sense.set_external(true);
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    for _ in 0..5 {
        assert_eq!(sup.tick(), Flow::Continue);
    }
    assert!(rig.system.calls().is_empty());
}

#[test]
fn feedback_timeout_without_button_reinitializes() {
    let cfg = AppConfig {
        max_without_feedback_secs: Some(2),
        ..AppConfig::default()
    };
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, None);

    assert_eq!(sup.tick(), Flow::Continue);
    assert_eq!(sup.tick(), Flow::Standby);

    // No deep sleep and the link stays up.
    assert!(rig.system.calls().is_empty());
    assert_eq!(tap.stopped.load(Ordering::SeqCst), 0);
    assert!(rig.link.is_connected());
}

#[test]
fn battery_is_sampled_with_divider_grounded() {
    let cfg = AppConfig {
        has_battery: true,
        ..AppConfig::default()
    };
    let mut rig = Rig::new(cfg.clone());
    rig.device.vbat.store(2210, Ordering::SeqCst);
    let mut sup = rig.supervisor(cfg, None);

    sup.tick();

    assert_eq!(rig.sense.vbat(), 2210);
    assert!(!rig.device.divider_on.load(Ordering::SeqCst));
}

#[test]
fn periodic_energy_check_reports_a_moved_battery() {
    let cfg = AppConfig {
        has_battery: true,
        energy_check_interval_secs: 2,
        ..AppConfig::default()
    };
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    rig.device.vbat.store(2000, Ordering::SeqCst);
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, None);

    sup.tick();
    assert_eq!(tap.output(), "");
    sup.tick();
    assert_eq!(tap.output(), "10:BAT:N:2000:\n");

    // Unchanged reading: nothing at the next interval.
    tap.clear();
    sup.tick();
    sup.tick();
    assert_eq!(tap.output(), "");
}

#[test]
fn external_power_change_forces_a_report() {
    let cfg = AppConfig {
        has_battery: true,
        ..AppConfig::default()
    };
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, None);

    rig.sense.set_external(true);
    assert!(!sup.handle_action(SupervisorAction::ExternalPowerChanged));
    assert_eq!(tap.output(), "10:EXT:N:0:\n");
}

#[test]
fn reset_timer_action_skips_the_tick() {
    let cfg = AppConfig::default();
    let mut rig = Rig::new(cfg.clone());
    let mut sup = rig.supervisor(cfg, None);
    sup.tick();
    sup.tick();

    assert!(sup.handle_action(SupervisorAction::ResetTimer));
    assert_eq!(rig.session.seconds(), 0);
}

#[test]
fn button_standby_notifies_the_app() {
    let cfg = standby_board(300);
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    rig.exchange("01:\n");
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    tap.clear();
    sup.handle_action(SupervisorAction::StandbyButton);

    assert_eq!(tap.output(), "99:Pressed button standby\n");
    assert_eq!(rig.system.calls().last(), Some(&SysCall::DeepSleep));
}

#[test]
fn standby_message_does_not_echo_to_the_app() {
    let cfg = standby_board(300);
    let mut rig = Rig::new(cfg.clone());
    rig.connect();
    rig.exchange("01:\n");
    let tap = rig.tap.clone();
    let mut sup = rig.supervisor(cfg, Some(ReleasedButton));

    tap.clear();
    sup.handle_action(SupervisorAction::StandbyMessage);

    assert_eq!(tap.output(), "");
    assert_eq!(rig.system.calls().last(), Some(&SysCall::DeepSleep));
}
