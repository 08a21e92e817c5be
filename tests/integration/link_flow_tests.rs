//! Link-level flows: reassembly, connection transitions, chunked send.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use blelink::config::LinkConfig;
use blelink::link::{BleServer, DEFAULT_ATT_MTU, DispatchMode, LinkError};

use crate::mock_hw::{ManualClock, MockStack, RecordedLines, StackTap, inline_link};

fn server(config: LinkConfig) -> (BleServer, StackTap, Arc<ManualClock>, Arc<RecordedLines>) {
    let (stack, tap) = MockStack::new();
    let clock = Arc::new(ManualClock::default());
    let lines = Arc::new(RecordedLines::default());
    let mut server = BleServer::new(config, stack, clock.clone());
    server.initialize("Esp32_Device_3456", lines.clone()).unwrap();
    (server, tap, clock, lines)
}

#[test]
fn split_lines_at_small_mtu_are_reassembled() {
    let (_server, tap, _, lines) = server(inline_link());
    let ingress = tap.ingress();
    ingress.on_connection_event(true);
    ingress.on_mtu_changed(20);

    ingress.on_raw_chunk(b"01:v1:Y:N\n02:");
    ingress.on_raw_chunk(b"foo\n");

    assert_eq!(lines.lines(), vec!["01:v1:Y:N", "02:foo"]);
}

#[test]
fn carriage_returns_and_blank_lines_are_ignored() {
    let (_server, tap, _, lines) = server(inline_link());
    let ingress = tap.ingress();
    ingress.on_connection_event(true);

    ingress.on_raw_chunk(b"\r\n\n80:\r\n\r\n70:x\r");
    ingress.on_raw_chunk(b"\n");

    assert_eq!(lines.lines(), vec!["80:", "70:x"]);
}

#[test]
fn disconnect_drops_the_partial_line() {
    let (_server, tap, _, lines) = server(inline_link());
    let ingress = tap.ingress();
    ingress.on_connection_event(true);
    ingress.on_raw_chunk(b"70:half");

    ingress.on_connection_event(false);
    ingress.on_connection_event(true);
    ingress.on_raw_chunk(b"80:\n");

    assert_eq!(lines.lines(), vec!["80:"]);
    assert_eq!(lines.connects.load(Ordering::SeqCst), 2);
    assert_eq!(lines.disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_partial_line_is_discarded_after_timeout() {
    let (_server, tap, clock, lines) = server(inline_link());
    let ingress = tap.ingress();
    ingress.on_connection_event(true);

    ingress.on_raw_chunk(b"70:stale");
    clock.advance(1_501);
    ingress.on_raw_chunk(b"70:fresh\n");

    assert_eq!(lines.lines(), vec!["70:fresh"]);
}

#[test]
fn slow_chunks_within_timeout_still_join() {
    let (_server, tap, clock, lines) = server(inline_link());
    let ingress = tap.ingress();
    ingress.on_connection_event(true);

    ingress.on_raw_chunk(b"70:a");
    clock.advance(1_000);
    ingress.on_raw_chunk(b"b");
    clock.advance(1_000);
    ingress.on_raw_chunk(b"c\n");

    assert_eq!(lines.lines(), vec!["70:abc"]);
}

#[test]
fn overlong_line_is_truncated() {
    let config = LinkConfig {
        max_line_len: 8,
        ..inline_link()
    };
    let (_server, tap, _, lines) = server(config);
    let ingress = tap.ingress();
    ingress.on_connection_event(true);

    ingress.on_raw_chunk(b"70:0123456789\n80:\n");

    assert_eq!(lines.lines(), vec!["70:01234", "80:"]);
}

#[test]
fn lines_before_connect_are_not_delivered() {
    let (_server, tap, _, lines) = server(inline_link());
    tap.ingress().on_raw_chunk(b"80:\n");
    assert!(lines.lines().is_empty());
}

#[test]
fn send_while_disconnected_is_a_noop() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();

    assert_eq!(link.try_send("80:"), Err(LinkError::NotConnected));
    link.send("80:");
    assert!(tap.fragments().is_empty());
}

#[test]
fn send_fragments_at_default_mtu() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    tap.ingress().on_connection_event(true);
    let message = "11:ESP32:*** Chip Info#* Model; 1#* Revision; 1#* Cores; 2";

    let sent = link.try_send(message).unwrap();

    let fragments = tap.fragments();
    let payload = usize::from(DEFAULT_ATT_MTU - 3);
    assert_eq!(sent, fragments.len());
    assert!(fragments.iter().all(|f| f.len() <= payload));
    assert_eq!(tap.output(), format!("{message}\n"));
}

#[test]
fn larger_mtu_is_capped_by_send_ceiling() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    let ingress = tap.ingress();
    ingress.on_connection_event(true);
    ingress.on_mtu_changed(517);

    link.send(&"x".repeat(400));

    let sizes: Vec<usize> = tap.fragments().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![180, 180, 41]);
}

#[test]
fn trailing_newline_is_not_doubled() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    tap.ingress().on_connection_event(true);

    link.send("11:FMEM:1\n11:VDD33:2\n");

    assert_eq!(tap.output(), "11:FMEM:1\n11:VDD33:2\n");
}

#[test]
fn empty_send_transmits_nothing() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    tap.ingress().on_connection_event(true);

    assert_eq!(link.try_send(""), Ok(0));
    assert!(tap.fragments().is_empty());
}

#[test]
fn notify_failure_aborts_the_message() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    tap.ingress().on_connection_event(true);
    tap.fail_notify.store(true, Ordering::SeqCst);

    assert_eq!(link.try_send("80:"), Err(LinkError::Notify(-1)));
}

#[test]
fn disconnect_restores_default_mtu() {
    let (server, tap, _, _) = server(inline_link());
    let link = server.handle();
    let ingress = tap.ingress();
    ingress.on_connection_event(true);
    ingress.on_mtu_changed(247);
    assert_eq!(link.state().mtu(), 247);

    ingress.on_connection_event(false);
    assert_eq!(link.state().mtu(), DEFAULT_ATT_MTU);
}

#[test]
fn deferred_dispatch_preserves_order() {
    let config = LinkConfig {
        dispatch: DispatchMode::Deferred,
        ..LinkConfig::default()
    };
    let (mut server, tap, _, lines) = server(config);
    let ingress = tap.ingress();
    ingress.on_connection_event(true);
    for i in 0..20 {
        ingress.on_raw_chunk(format!("70:{i}\n").as_bytes());
    }

    // Finalize drains the queue before the disconnect is delivered.
    server.finalize();

    let expected: Vec<String> = (0..20).map(|i| format!("70:{i}")).collect();
    assert_eq!(lines.lines(), expected);
    assert_eq!(tap.stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn finalize_reports_disconnect_and_reinitialize_works() {
    let (mut server, tap, _, lines) = server(inline_link());
    tap.ingress().on_connection_event(true);

    server.finalize();
    assert!(!server.is_connected());
    assert_eq!(lines.disconnects.load(Ordering::SeqCst), 1);

    server.initialize("Esp32_Device_3456", lines.clone()).unwrap();
    assert_eq!(tap.started.load(Ordering::SeqCst), 2);
}

#[test]
fn retained_ingress_is_inert_after_finalize() {
    for dispatch in [DispatchMode::Inline, DispatchMode::Deferred] {
        let config = LinkConfig {
            dispatch,
            ..LinkConfig::default()
        };
        let (mut server, tap, _, lines) = server(config);
        let ingress = tap.ingress();
        server.finalize();

        ingress.on_connection_event(true);
        ingress.on_raw_chunk(b"80:\n");

        assert!(lines.lines().is_empty(), "{dispatch:?}");
        assert_eq!(lines.connects.load(Ordering::SeqCst), 0, "{dispatch:?}");
        assert!(!server.is_connected(), "{dispatch:?}");
    }
}
