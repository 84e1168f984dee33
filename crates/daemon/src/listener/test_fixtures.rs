// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for listener tests: an agent context over simulated
//! boards, and a client that drives `handle_connection` in memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mpr_core::{ErrorReport, Port, SessionId};
use mpr_wire::{read_frame, write_request, Frame, Reply, Request, Status, Verb};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::{handle_connection, ConnectionError, ListenCtx};
use crate::connection::fake::FakeOpener;
use crate::connection::{ConnectionTable, PortOpener};
use crate::repl::fake::{quick_timeouts, FakeBoard};

pub const TIMEOUT: Duration = Duration::from_secs(10);
pub const PICO: &str = "/dev/ttyACM0";
pub const ESP: &str = "/dev/ttyUSB0";
pub const OTHER: &str = "/dev/ttyACM1";
pub const SETUP: Verb = Verb::Setup { background: false };

pub struct Harness {
    pub ctx: Arc<ListenCtx>,
    pub opener: Arc<FakeOpener>,
}

impl Harness {
    pub fn new() -> Self {
        let opener = Arc::new(FakeOpener::new());
        let table =
            ConnectionTable::new(Arc::clone(&opener) as Arc<dyn PortOpener>, quick_timeouts());
        let ctx = ListenCtx::new(
            table,
            PathBuf::from("/tmp/mpr-test/agent.sock"),
            Arc::new(Notify::new()),
        );
        Self { ctx: Arc::new(ctx), opener }
    }

    pub fn plug(&self, port: &str) -> FakeBoard {
        self.opener.plug(port, FakeBoard::new())
    }

    /// Send one request and collect every frame up to the final status.
    pub async fn send(&self, request: Request) -> Vec<Frame> {
        let mut client = self.open(request).await;
        client.frames().await
    }

    /// Send a request and keep the connection for more traffic.
    pub async fn open(&self, request: Request) -> Client {
        let (client, agent) = tokio::io::duplex(64 * 1024);
        let (agent_read, agent_write) = tokio::io::split(agent);
        let ctx = Arc::clone(&self.ctx);
        let server =
            tokio::spawn(async move { handle_connection(agent_read, agent_write, &ctx).await });
        let (read, mut write) = tokio::io::split(client);
        write_request(&mut write, &request, TIMEOUT).await.unwrap();
        Client { read, write, server }
    }
}

pub struct Client {
    pub read: ReadHalf<DuplexStream>,
    pub write: WriteHalf<DuplexStream>,
    pub server: JoinHandle<Result<(), ConnectionError>>,
}

impl Client {
    pub async fn next_frame(&mut self) -> Frame {
        read_frame(&mut self.read, Some(TIMEOUT)).await.unwrap()
    }

    pub async fn frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            let frame = self.next_frame().await;
            let last = frame.is_final();
            frames.push(frame);
            if last {
                return frames;
            }
        }
    }
}

pub fn request(sid: &str, verb: Verb) -> Request {
    Request::new(SessionId::new(sid), verb)
}

pub fn on(sid: &str, port: &str, verb: Verb) -> Request {
    request(sid, verb).port(Some(Port::new(port)))
}

pub fn status_of(frames: &[Frame]) -> &Status {
    match frames.last() {
        Some(Frame::Status(status)) => status,
        other => panic!("expected final status, got {other:?}"),
    }
}

pub fn reply_of(frames: &[Frame]) -> &Reply {
    match &status_of(frames).reply {
        Some(reply) => reply,
        None => panic!("expected a reply in {frames:?}"),
    }
}

pub fn error_of(frames: &[Frame]) -> &ErrorReport {
    frames
        .iter()
        .find_map(|f| match f {
            Frame::Error(report) => Some(report),
            _ => None,
        })
        .unwrap_or_else(|| panic!("expected an error frame in {frames:?}"))
}

pub fn stdout_of(frames: &[Frame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Stdout(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
