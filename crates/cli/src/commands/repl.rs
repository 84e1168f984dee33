// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive takeover: `mpr repl` and attached `mpr run`.
//!
//! Board output is rendered as it arrives while keyboard input travels back
//! on the same connection. The board stays leased to this terminal until
//! the exit key, the end of the program, or the connection dropping.

use std::io::Read;

use anyhow::Result;
use mpr_core::exit_code;
use mpr_wire::{read_frame, write_input, Frame, Input, Utf8Carry, Verb};
use tokio::sync::mpsc;

use super::{Invocation, Tally};
use crate::client::ClientError;
use crate::env;
use crate::exit_error::ExitError;
use crate::terminal::{split_exit, RawMode, EXIT_KEY_NAME};

pub async fn takeover(inv: &Invocation, verb: Verb) -> Result<()> {
    let is_repl = verb == Verb::Repl;
    let exchange = inv
        .client
        .open(&inv.request(verb), true)
        .await
        .map_err(|e| ExitError::from(e.report()))?;
    let (mut read, mut write) = (exchange.read, exchange.write);

    let raw = if is_repl {
        eprintln!("Entering REPL ({EXIT_KEY_NAME} to exit)");
        RawMode::enable()?
    } else {
        None
    };

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        loop {
            let frame = read_frame(&mut read, None).await;
            let last = frame.as_ref().map_or(true, Frame::is_final);
            if frame_tx.send(frame).is_err() || last {
                break;
            }
        }
    });
    let mut keys = spawn_stdin();
    let mut typed = Utf8Carry::default();

    let mut tally = Tally::default();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let mut input_open = true;
    let outcome = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => break Err(ExitError::from(ClientError::from(e).report())),
                    None => break Err(ExitError::new(exit_code::AGENT, "agent closed the connection")),
                };
                if let Some(done) = tally.apply(frame, &mut stdout, &mut stderr) {
                    break done.map(|_| ());
                }
            }
            chunk = keys.recv(), if input_open => {
                input_open = chunk.is_some();
                for input in translate(chunk, is_repl, &mut typed) {
                    input_open &= input != Input::Exit;
                    let _ = write_input(&mut write, &input, env::ipc_timeout()).await;
                }
            }
            _ = tokio::signal::ctrl_c(), if !is_repl => {
                let _ = write_input(&mut write, &Input::Interrupt, env::ipc_timeout()).await;
            }
        }
    };
    reader.abort();
    drop(raw);
    if is_repl {
        eprintln!();
    }
    outcome.map_err(Into::into)
}

/// Turn one stdin read into the messages for the agent. A multi-byte
/// character split between reads is held in `text` until it completes.
///
/// `None` is end of input: a REPL leaves, a running program just stops
/// receiving keystrokes.
pub fn translate(chunk: Option<Vec<u8>>, is_repl: bool, text: &mut Utf8Carry) -> Vec<Input> {
    let (data, exit) = match &chunk {
        None => (text.finish(), is_repl),
        Some(bytes) => {
            let (forward, exit) = if is_repl { split_exit(bytes) } else { (&bytes[..], false) };
            let mut data = text.push(forward);
            if exit {
                data.push_str(&text.finish());
            }
            (data, exit)
        }
    };
    let mut inputs = Vec::new();
    if !data.is_empty() {
        inputs.push(Input::Data(data));
    }
    if exit {
        inputs.push(Input::Exit);
    }
    inputs
}

/// Stdin reads block, so they run on their own thread.
fn spawn_stdin() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
#[path = "repl_tests.rs"]
mod tests;
