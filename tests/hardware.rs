//! Tests requiring a real serial device.
//!
//! These tests are skipped unless a device is named in the environment.
//!
//! # Running hardware tests
//!
//! ```bash
//! export RAWSERIAL_TEST_PORT=/dev/ttyUSB0   # or COM3 on Windows
//! export RAWSERIAL_TEST_BAUD=115200         # optional, default: 9600
//! export RAWSERIAL_TEST_LOOPBACK=1          # if TX and RX are wired together
//!
//! cargo test --test hardware -- --ignored
//! ```

use rawserial::{Mode, SerialPort};
use std::env;
use std::time::Duration;

fn test_port() -> Option<String> {
    let port = env::var("RAWSERIAL_TEST_PORT").ok();
    if port.is_none() {
        println!("skipping hardware test: RAWSERIAL_TEST_PORT not set");
    }
    port
}

fn test_baud() -> u32 {
    env::var("RAWSERIAL_TEST_BAUD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9600)
}

fn loopback_enabled() -> bool {
    env::var("RAWSERIAL_TEST_LOOPBACK").ok().as_deref() == Some("1")
}

#[test]
#[ignore] // Run with --ignored and RAWSERIAL_TEST_PORT set
fn open_configure_close() {
    let Some(name) = test_port() else { return };
    let baud = test_baud();
    println!("testing {name} at {baud} baud");

    let port = rawserial::open(&name).unwrap();
    assert_eq!(port.name(), name);

    let mode = Mode {
        baud_rate: baud,
        ..Mode::default()
    };
    port.set_mode(&mode).unwrap();

    let (input, output) = port.baud_rate();
    println!("driver reports in/out {input}/{output}");
    assert!(input > 0);
    assert!(output > 0);

    port.close().unwrap();
}

#[test]
#[ignore]
fn loopback_roundtrip() {
    let Some(name) = test_port() else { return };
    if !loopback_enabled() {
        println!("skipping loopback test: RAWSERIAL_TEST_LOOPBACK not set");
        return;
    }

    let port = rawserial::open(&name).unwrap();
    port.set_mode(&Mode {
        baud_rate: test_baud(),
        ..Mode::default()
    })
    .unwrap();
    port.set_read_params(0, Duration::from_millis(2000)).unwrap();

    let payload = b"rawserial loopback probe";
    let mut written = 0;
    while written < payload.len() {
        written += port.write_bytes(&payload[written..]).unwrap();
    }

    let mut collected = Vec::new();
    let mut buf = [0u8; 64];
    while collected.len() < payload.len() {
        match port.read_bytes(&mut buf) {
            Ok(n) => collected.extend_from_slice(&buf[..n]),
            Err(e) => panic!("loopback read failed after {} bytes: {e}", collected.len()),
        }
    }
    assert_eq!(&collected[..payload.len()], payload);
}

#[test]
#[ignore]
fn idle_line_times_out() {
    let Some(name) = test_port() else { return };
    if loopback_enabled() {
        println!("skipping idle test: loopback wiring would echo");
        return;
    }

    let port = rawserial::open(&name).unwrap();
    port.set_read_params(0, Duration::from_millis(300)).unwrap();

    let mut buf = [0u8; 16];
    match port.read_bytes(&mut buf) {
        Err(e) if e.is_timeout() => {}
        other => println!("line was not idle: {other:?}"),
    }
}
