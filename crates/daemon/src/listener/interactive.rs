// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive takeover for `repl` and attached `run`.
//!
//! The session leases the board: output streams to the client, keyboard
//! input flows back as [`Input`] messages, and the lease holds until the
//! client sends `Exit`, the program finishes, or the client disconnects.
//! Other sessions get `board_busy` meanwhile instead of an unexplained hang.

use std::sync::mpsc as std_mpsc;

use mpr_core::ErrorReport;
use mpr_wire::{read_input, write_frame, Input, Request, Status, Verb};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::board::read_script;
use super::sink::{finish, SinkConsole};
use super::target::{self, Target};
use super::{ConnectionError, ListenCtx};
use crate::connection::Job;
use crate::env::ipc_timeout;
use crate::repl::{Cancel, ConsoleInput};

pub(super) async fn handle<R, W>(
    request: Request,
    reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let target = Target::of(&request);
    let outcome = takeover(request.verb, &target, reader, &mut writer, ctx).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    finish(&tx, outcome);
    drop(tx);
    while let Some(frame) = rx.recv().await {
        write_frame(&mut writer, &frame, ipc_timeout()).await?;
    }
    Ok(())
}

async fn takeover<R, W>(
    verb: Verb,
    target: &Target,
    mut reader: R,
    writer: &mut W,
    ctx: &ListenCtx,
) -> Result<Status, ErrorReport>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    let code = match &verb {
        Verb::Run { path, .. } => Some(read_script(path).await?),
        _ => None,
    };
    let conn = target::connect(ctx, target).await?;
    let port = conn.port().clone();
    let job = Job { sid: target.sid.clone(), verb: verb.name(), leased: true, wait: target.wait };
    let lease = conn.acquire(job).await.map_err(|e| ctx.board_error(&port, e))?;
    let cancel = lease.cancel().clone();
    info!(sid = %target.sid, %port, verb = verb.name(), "interactive session started");

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = std_mpsc::channel();

    let worker = tokio::task::spawn_blocking(move || {
        lease.run(move |engine, cancel| {
            let mut console = SinkConsole::new(frame_tx, cancel).with_input(input_rx);
            match code {
                Some(code) => engine.exec(code.as_bytes(), &mut console, None),
                None => engine.bridge(&mut console),
            }
        })
    });

    let reader_cancel = cancel.clone();
    let input_task = tokio::spawn(async move {
        loop {
            match read_input(&mut reader).await {
                Ok(input) => {
                    let exit = input == Input::Exit;
                    if input_tx.send(console_input(input)).is_err() || exit {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "interactive client went away");
                    let _ = input_tx.send(ConsoleInput::Exit);
                    reader_cancel.cancel();
                    break;
                }
            }
        }
    });

    // Frames stop when the board work ends and drops its console.
    let mut client_gone = false;
    while let Some(frame) = frame_rx.recv().await {
        if client_gone {
            continue;
        }
        if write_frame(writer, &frame, ipc_timeout()).await.is_err() {
            client_gone = true;
            abandon(&cancel);
        }
    }
    let outcome = worker.await;
    input_task.abort();
    info!(sid = %target.sid, %port, "interactive session ended");

    conn.settle(outcome).map_err(|e| ctx.board_error(&port, e))?;
    Ok(Status::ok())
}

fn console_input(input: Input) -> ConsoleInput {
    match input {
        Input::Data(text) => ConsoleInput::Data(text.into_bytes()),
        Input::Interrupt => ConsoleInput::Interrupt,
        Input::Exit => ConsoleInput::Exit,
    }
}

fn abandon(cancel: &Cancel) {
    debug!("interactive output undeliverable, releasing board");
    cancel.cancel();
}

#[cfg(test)]
#[path = "interactive_tests.rs"]
mod tests;
