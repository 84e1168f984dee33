// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;

use mpr_core::{ErrorCode, Port};

use super::*;

#[yare::parameterized(
    enter_raw = { ReplError::EnterRaw, ErrorCode::ProtocolTimeout },
    timeout = { ReplError::Timeout { waiting_for: "OK" }, ErrorCode::ProtocolTimeout },
    desync = { ReplError::Desync("x".into()), ErrorCode::ProtocolTimeout },
    corrupted = { ReplError::TransferCorrupted("x".into()), ErrorCode::TransferCorrupted },
    gone = { ReplError::DeviceGone(io::Error::from(io::ErrorKind::BrokenPipe)), ErrorCode::DeviceNotFound },
    remote = { ReplError::Remote("Traceback".into()), ErrorCode::RemoteException },
    interrupted = { ReplError::Interrupted, ErrorCode::Interrupted },
)]
fn report_codes(err: ReplError, code: ErrorCode) {
    assert_eq!(err.report(&Port::new("/dev/ttyACM0")).code, code);
}

#[test]
fn remote_report_is_the_bare_traceback() {
    let err = ReplError::Remote("Traceback\r\nValueError: boom\r\n".into());
    let report = err.report(&Port::new("COM3"));
    assert_eq!(report.message, "Traceback\r\nValueError: boom");
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn device_reports_name_the_port() {
    let report = ReplError::EnterRaw.report(&Port::new("COM3"));
    assert_eq!(report.message, "COM3: could not enter raw mode");
}

#[test]
fn cancel_is_shared_between_clones() {
    let cancel = Cancel::new();
    let other = cancel.clone();
    assert!(!other.is_cancelled());
    cancel.cancel();
    assert!(other.is_cancelled());
}

#[test]
fn capture_collects_and_reports_cancel() {
    let cancel = Cancel::new();
    let mut capture = Capture::new(&cancel);
    capture.stdout(b"ab");
    capture.stdout(b"c");
    assert!(!capture.cancelled());
    cancel.cancel();
    assert!(capture.cancelled());
    assert_eq!(capture.into_bytes(), b"abc");
}
