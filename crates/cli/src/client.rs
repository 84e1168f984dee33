// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Talking to the agent: connect, start it on demand, exchange frames.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use mpr_core::{ErrorCode, ErrorReport};
use mpr_wire::{read_frame, write_request, Frame, ProtocolError, Reply, Request, Verb};
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use crate::env;

/// First retry delay while waiting for a freshly spawned agent.
const START_BACKOFF: Duration = Duration::from_millis(20);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

const STARTUP_MARKER: &str = "--- mprd: starting";
const STARTUP_FAILED: &str = "failed to start agent: ";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("agent is not running")]
    NotRunning,

    #[error("could not determine state directory (set MPR_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("agent failed to start: {0}")]
    StartFailed(String),

    #[error("agent did not answer within {0:?}")]
    StartTimeout(Duration),

    #[error("cannot launch agent {0}: {1}")]
    Spawn(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unexpected reply from agent: {0}")]
    UnexpectedReply(String),
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning)
    }

    pub fn report(&self) -> ErrorReport {
        let code = match self {
            ClientError::StartFailed(_) => ErrorCode::AgentBind,
            ClientError::UnexpectedReply(_) => ErrorCode::AgentInternal,
            _ => ErrorCode::AgentUnreachable,
        };
        ErrorReport::new(code, self.to_string())
    }
}

/// One open request stream.
pub struct Exchange {
    pub read: OwnedReadHalf,
    pub write: OwnedWriteHalf,
}

impl Exchange {
    /// Next frame; `None` waits indefinitely (board work may take long).
    pub async fn next_frame(&mut self) -> Result<Frame, ClientError> {
        Ok(read_frame(&mut self.read, None).await?)
    }
}

pub struct AgentClient {
    state_dir: PathBuf,
}

impl AgentClient {
    pub fn new() -> Result<Self, ClientError> {
        env::state_dir().map(Self::in_dir).ok_or(ClientError::NoStateDir)
    }

    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("agent.sock")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("agent.log")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("agent.pid")
    }

    /// Connect to a running agent.
    pub async fn connect(&self) -> Result<UnixStream, ClientError> {
        let path = self.socket_path();
        match tokio::time::timeout(env::ipc_timeout(), UnixStream::connect(&path)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(_)) | Err(_) => Err(ClientError::NotRunning),
        }
    }

    /// Connect, starting the agent first if nobody answers.
    pub async fn connect_or_start(&self) -> Result<UnixStream, ClientError> {
        if let Ok(stream) = self.connect().await {
            return Ok(stream);
        }
        let mut child = self.spawn_agent()?;
        self.wait_until_ready(&mut child).await?;
        self.connect().await
    }

    /// Launch `mprd` detached from this terminal.
    pub fn spawn_agent(&self) -> Result<Child, ClientError> {
        use std::os::unix::process::CommandExt;

        let binary = find_mprd_binary();
        Command::new(&binary)
            .env("MPR_STATE_DIR", &self.state_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| ClientError::Spawn(binary, e))
    }

    /// Poll with a ping until the agent answers, it dies, or time runs out.
    async fn wait_until_ready(&self, child: &mut Child) -> Result<(), ClientError> {
        let deadline = Instant::now() + env::start_timeout();
        let mut delay = START_BACKOFF;
        loop {
            if self.ping().await.is_ok() {
                return Ok(());
            }
            if let Ok(Some(status)) = child.try_wait() {
                // Exit 0 means another agent won the lock; keep polling for it.
                if !status.success() {
                    return Err(self.startup_failure(status.to_string()));
                }
            }
            if Instant::now() >= deadline {
                return Err(match self.read_startup_error() {
                    Some(message) => ClientError::StartFailed(message),
                    None => ClientError::StartTimeout(env::start_timeout()),
                });
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_BACKOFF);
        }
    }

    fn startup_failure(&self, fallback: String) -> ClientError {
        ClientError::StartFailed(self.read_startup_error().unwrap_or(fallback))
    }

    fn read_startup_error(&self) -> Option<String> {
        let log = std::fs::read_to_string(self.log_path()).ok()?;
        parse_startup_error(&log)
    }

    /// Send `request` on a fresh connection.
    pub async fn open(&self, request: &Request, start: bool) -> Result<Exchange, ClientError> {
        let stream = if start { Box::pin(self.connect_or_start()).await? } else { self.connect().await? };
        let (read, mut write) = stream.into_split();
        write_request(&mut write, request, env::ipc_timeout()).await?;
        Ok(Exchange { read, write })
    }

    /// Agent version, without starting it.
    pub async fn ping(&self) -> Result<String, ClientError> {
        let request = Request::new(env::session_id(), Verb::Ping);
        let mut exchange = self.open(&request, false).await?;
        loop {
            match exchange.next_frame().await? {
                Frame::Status(status) => {
                    return match status.reply {
                        Some(Reply::Pong { version }) => Ok(version),
                        other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
                    };
                }
                Frame::Error(report) => return Err(ClientError::UnexpectedReply(report.to_string())),
                _ => {}
            }
        }
    }

    /// Ask the agent to stop and wait for its socket to go away.
    ///
    /// Returns `false` when no agent was running.
    pub async fn stop(&self) -> Result<bool, ClientError> {
        let request = Request::new(env::session_id(), Verb::Shutdown);
        let mut exchange = match self.open(&request, false).await {
            Ok(exchange) => exchange,
            Err(ClientError::NotRunning) => return Ok(false),
            Err(e) => return Err(e),
        };
        while !exchange.next_frame().await?.is_final() {}
        drop(exchange);

        let deadline = Instant::now() + env::start_timeout();
        while self.socket_path().exists() && Instant::now() < deadline {
            tokio::time::sleep(START_BACKOFF).await;
        }
        Ok(true)
    }
}

/// Error message from the most recent startup attempt recorded in the log.
///
/// Only lines after the last startup marker count, so failures from older
/// runs are never reported as this one's.
pub fn parse_startup_error(log: &str) -> Option<String> {
    let start = log.rfind(STARTUP_MARKER)?;
    log[start..].lines().skip(1).find(|line| line.contains("ERROR")).map(|line| {
        match line.find(STARTUP_FAILED) {
            Some(at) => line[at + STARTUP_FAILED.len()..].trim().to_string(),
            None => line.trim().to_string(),
        }
    })
}

/// Locate the agent binary: `MPR_AGENT_BIN`, a dev build next to the
/// workspace, a sibling of this executable, then `PATH`.
pub fn find_mprd_binary() -> PathBuf {
    if let Some(path) = env::agent_binary() {
        return path;
    }
    let current_exe = std::env::current_exe().ok();

    // Only trust CARGO_MANIFEST_DIR when the CLI itself is a debug build.
    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .is_some_and(|s| s.contains("target/debug"));
    if is_debug_build {
        if let Some(manifest_dir) = env::cargo_manifest_dir() {
            let dev_path = Path::new(&manifest_dir)
                .parent()
                .and_then(Path::parent)
                .map(|p| p.join("target/debug/mprd"));
            if let Some(path) = dev_path.filter(|p| p.exists()) {
                return path;
            }
        }
    }

    if let Some(sibling) =
        current_exe.as_deref().and_then(Path::parent).map(|dir| dir.join("mprd"))
    {
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from("mprd")
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
