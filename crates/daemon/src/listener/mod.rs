// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Every client connection carries one request. The listener resolves the
//! target board, runs the work under the board's execution lock and streams
//! frames back as they are produced.

mod board;
mod interactive;
mod session;
mod sink;
mod target;
mod tree;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub(crate) use session::collect_sessions;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mpr_core::{ErrorCode, ErrorReport, Port, SessionRegistry};
use mpr_wire::{read_request, ProtocolError, Reply, Request, Status, Verb};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionTable, ExecError};
use crate::env::{ipc_timeout, PROTOCOL_VERSION};
use sink::{finish, forward_frames, FrameTx};
use target::Target;

/// Shared agent context for all request handlers.
pub struct ListenCtx {
    pub connections: ConnectionTable,
    pub registry: Mutex<SessionRegistry>,
    pub socket_path: PathBuf,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    last_activity: Mutex<Instant>,
}

impl ListenCtx {
    pub fn new(connections: ConnectionTable, socket_path: PathBuf, shutdown: Arc<Notify>) -> Self {
        let now = Instant::now();
        Self {
            connections,
            registry: Mutex::new(SessionRegistry::new()),
            socket_path,
            start_time: now,
            shutdown,
            last_activity: Mutex::new(now),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since a client last connected.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// A board went away: drop its connection and every session reference,
    /// so the next request opens it afresh.
    pub fn forget_port(&self, port: &Port) {
        let port = port.normalized();
        self.connections.remove(&port);
        for detached in self.registry.lock().remove_port(&port) {
            match detached.promoted {
                Some(next) => info!(sid = %detached.sid, %port, fg = %next, "board dropped from session"),
                None => info!(sid = %detached.sid, %port, "board dropped from session"),
            }
        }
    }

    /// Report a failed board operation, forgetting the board if it is gone.
    pub(crate) fn board_error(&self, port: &Port, err: ExecError) -> ErrorReport {
        if err.is_device_gone() {
            self.forget_port(port);
        }
        err.report(port)
    }
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    self.ctx.touch();
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => debug!("Client disconnected"),
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("Connection timeout"),
        ConnectionError::Protocol(_) => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// Interactive verbs take over the connection for keyboard input. Everything
/// else races the request against client disconnect: if the client goes
/// away first, the request future is dropped, which interrupts any board
/// work it started.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut request = read_request(&mut reader, ipc_timeout()).await?;
    request.port = request.port.map(|p| p.normalized());
    request.default_port = request.default_port.map(|p| p.normalized());

    if matches!(request.verb, Verb::Ping | Verb::Status) {
        debug!(sid = %request.sid, verb = request.verb.name(), "received request");
    } else {
        info!(sid = %request.sid, verb = request.verb.name(), port = ?request.port, "received request");
    }

    if request.verb.is_interactive() {
        return interactive::handle(request, reader, writer, ctx).await;
    }

    let streaming = request.streaming;
    let (tx, rx) = mpsc::unbounded_channel();
    let work = async move {
        let outcome = dispatch(request, ctx, &tx).await;
        finish(&tx, outcome);
    };
    let forward = forward_frames(rx, &mut writer, streaming, ipc_timeout());

    tokio::select! {
        (_, written) = async { tokio::join!(work, forward) } => written?,
        _ = detect_client_disconnect(&mut reader) => {
            debug!("Client disconnected, cancelling request");
        }
    }
    Ok(())
}

/// Detect client disconnect by reading from the socket after the request.
///
/// The client sends nothing after its request, so a read only returns once
/// the client closes the connection.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

async fn dispatch(request: Request, ctx: &ListenCtx, tx: &FrameTx) -> Result<Status, ErrorReport> {
    let target = Target::of(&request);
    match request.verb {
        Verb::Ping => Ok(Status::reply(Reply::Pong { version: PROTOCOL_VERSION.to_string() })),

        Verb::Status => Ok(session::status(ctx, &target.sid)),

        Verb::Ports => session::ports(ctx),

        Verb::Shutdown => {
            info!(sid = %target.sid, "shutdown requested");
            ctx.request_shutdown();
            Ok(Status::reply(Reply::ShuttingDown))
        }

        Verb::Setup { background } => session::setup(ctx, &target, background).await,

        Verb::Fg => session::fg(ctx, &target),

        Verb::Disconnect { all } => session::disconnect(ctx, &target, all).await,

        Verb::Stop => board::stop(ctx, &target, tx),

        Verb::Repl | Verb::Run { detach: false, .. } => Err(ErrorReport::new(
            ErrorCode::AgentInternal,
            "interactive request reached the plain dispatcher",
        )),

        verb => board::handle(ctx, &target, verb, tx).await,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
