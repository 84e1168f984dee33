// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Getting board output back to the client.
//!
//! Board work runs on the blocking pool and pushes [`Frame`]s into an
//! unbounded channel; the connection task writes them to the socket.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use mpr_core::{ErrorReport, Port};
use mpr_wire::{write_frame, Frame, ProtocolError, Status, Utf8Carry};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::repl::{Cancel, Console, ConsoleInput};

pub(crate) type FrameTx = UnboundedSender<Frame>;

/// Console that forwards program output as stdout frames.
pub(crate) struct SinkConsole {
    tx: FrameTx,
    text: Utf8Carry,
    cancel: Cancel,
    input: Option<Receiver<ConsoleInput>>,
}

impl SinkConsole {
    pub(crate) fn new(tx: FrameTx, cancel: &Cancel) -> Self {
        Self { tx, text: Utf8Carry::default(), cancel: cancel.clone(), input: None }
    }

    /// Deliver keyboard input from the client to the board.
    pub(crate) fn with_input(mut self, input: Receiver<ConsoleInput>) -> Self {
        self.input = Some(input);
        self
    }
}

impl Console for SinkConsole {
    fn stdout(&mut self, bytes: &[u8]) {
        let text = self.text.push(bytes);
        if !text.is_empty() {
            let _ = self.tx.send(Frame::Stdout(text));
        }
    }

    fn poll_input(&mut self) -> ConsoleInput {
        let Some(input) = &self.input else {
            return ConsoleInput::None;
        };
        match input.try_recv() {
            Ok(input) => input,
            Err(TryRecvError::Empty) => ConsoleInput::None,
            Err(TryRecvError::Disconnected) => ConsoleInput::Exit,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SinkConsole {
    fn drop(&mut self) {
        let rest = self.text.finish();
        if !rest.is_empty() {
            let _ = self.tx.send(Frame::Stdout(rest));
        }
    }
}

/// Console for detached programs: nobody is listening, so output goes to
/// the agent log.
pub(crate) struct LogConsole {
    port: Port,
    cancel: Cancel,
}

impl LogConsole {
    pub(crate) fn new(port: Port, cancel: &Cancel) -> Self {
        Self { port, cancel: cancel.clone() }
    }
}

impl Console for LogConsole {
    fn stdout(&mut self, bytes: &[u8]) {
        debug!(port = %self.port, output = %String::from_utf8_lossy(bytes), "detached program output");
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Queue the frames that end a request.
pub(crate) fn finish(tx: &FrameTx, outcome: Result<Status, ErrorReport>) {
    match outcome {
        Ok(status) => {
            let _ = tx.send(Frame::Status(status));
        }
        Err(report) => {
            let status = Status::failed(&report);
            let _ = tx.send(Frame::Error(report));
            let _ = tx.send(Frame::Status(status));
        }
    }
}

/// Write queued frames until the final status.
///
/// Without `streaming`, stdout is held back and sent as one frame ahead of
/// the next frame of any other kind.
pub(crate) async fn forward_frames<W>(
    mut rx: UnboundedReceiver<Frame>,
    writer: &mut W,
    streaming: bool,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut held = String::new();
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Stdout(text) if !streaming => held.push_str(&text),
            frame => {
                let last = frame.is_final();
                if !held.is_empty() {
                    let stdout = Frame::Stdout(std::mem::take(&mut held));
                    write_frame(writer, &stdout, timeout).await?;
                }
                write_frame(writer, &frame, timeout).await?;
                if last {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
