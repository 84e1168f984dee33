// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mpr_core::ErrorCode;
use mpr_wire::read_frame;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(1);

#[test]
fn console_flushes_a_dangling_sequence_on_drop() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let mut console = SinkConsole::new(tx, &Cancel::new());
        console.stdout(&"é".as_bytes()[..1]);
    }
    assert_eq!(rx.try_recv().unwrap(), Frame::Stdout("\u{fffd}".to_string()));
}

#[test]
fn console_reports_exit_when_input_goes_away() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = std::sync::mpsc::channel();
    let mut console = SinkConsole::new(tx, &Cancel::new()).with_input(input_rx);
    input_tx.send(ConsoleInput::Data(b"x".to_vec())).unwrap();
    assert_eq!(console.poll_input(), ConsoleInput::Data(b"x".to_vec()));
    assert_eq!(console.poll_input(), ConsoleInput::None);
    drop(input_tx);
    assert_eq!(console.poll_input(), ConsoleInput::Exit);
}

#[tokio::test]
async fn buffered_stdout_is_one_frame_before_the_status() {
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(Frame::Stdout("a".into())).unwrap();
    tx.send(Frame::Stdout("b".into())).unwrap();
    finish(&tx, Ok(Status::ok()));

    let (mut client, mut agent) = tokio::io::duplex(4096);
    forward_frames(rx, &mut agent, false, TIMEOUT).await.unwrap();

    assert_eq!(read_frame(&mut client, Some(TIMEOUT)).await.unwrap(), Frame::Stdout("ab".into()));
    assert_eq!(read_frame(&mut client, Some(TIMEOUT)).await.unwrap(), Frame::Status(Status::ok()));
}

#[tokio::test]
async fn streaming_keeps_each_chunk() {
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(Frame::Stdout("a".into())).unwrap();
    tx.send(Frame::Stdout("b".into())).unwrap();
    finish(&tx, Ok(Status::ok()));

    let (mut client, mut agent) = tokio::io::duplex(4096);
    forward_frames(rx, &mut agent, true, TIMEOUT).await.unwrap();

    assert_eq!(read_frame(&mut client, Some(TIMEOUT)).await.unwrap(), Frame::Stdout("a".into()));
    assert_eq!(read_frame(&mut client, Some(TIMEOUT)).await.unwrap(), Frame::Stdout("b".into()));
}

#[tokio::test]
async fn failure_sends_error_then_status_with_its_exit_code() {
    let (tx, rx) = mpsc::unbounded_channel();
    let report = ErrorReport::new(ErrorCode::NoTarget, "nothing to talk to");
    finish(&tx, Err(report.clone()));

    let (mut client, mut agent) = tokio::io::duplex(4096);
    forward_frames(rx, &mut agent, false, TIMEOUT).await.unwrap();

    assert_eq!(read_frame(&mut client, Some(TIMEOUT)).await.unwrap(), Frame::Error(report));
    match read_frame(&mut client, Some(TIMEOUT)).await.unwrap() {
        Frame::Status(status) => assert_eq!(status.exit_code, 3),
        other => panic!("expected status, got {other:?}"),
    }
}
