// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: startup, drain, and shutdown.

mod housekeeping;
mod startup;
pub use housekeeping::housekeeping;
pub use startup::startup;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::listener::ListenCtx;

/// Agent file layout
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/mpr)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to agent log file
    pub log_path: PathBuf,
}

impl Config {
    /// One agent per user, under `~/.local/state/mpr/` (or `$MPR_STATE_DIR`).
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::in_dir(&crate::env::state_dir()?))
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            socket_path: state_dir.join("agent.sock"),
            lock_path: state_dir.join("agent.pid"),
            version_path: state_dir.join("agent.version"),
            log_path: state_dir.join("agent.log"),
            state_dir: state_dir.to_path_buf(),
        }
    }
}

/// Agent state while running.
pub struct AgentState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub start_time: Instant,
}

/// Result of startup: the agent's files are claimed and the socket is bound.
pub struct StartupResult {
    pub agent: AgentState,
    pub listener: UnixListener,
}

impl AgentState {
    /// Remove the agent's files. Boards should already be drained.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down agent...");

        for (path, what) in [
            (&self.config.socket_path, "socket file"),
            (&self.config.lock_path, "PID file"),
            (&self.config.version_path, "version file"),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {what}: {e}");
                }
            }
        }

        info!(uptime_secs = self.start_time.elapsed().as_secs(), "Agent shutdown complete");
        Ok(())
    }
}

/// Close every board in parallel, each bounded by `timeout`, then forget
/// all sessions.
pub async fn drain(ctx: &ListenCtx, timeout: Duration) {
    let conns = ctx.connections.drain();
    if !conns.is_empty() {
        info!(count = conns.len(), "closing board connections");
    }
    let mut closing = JoinSet::new();
    for conn in conns {
        closing.spawn(async move {
            conn.close(timeout).await;
            conn.port().clone()
        });
    }
    while let Some(joined) = closing.join_next().await {
        match joined {
            Ok(port) => info!(%port, "board released"),
            Err(e) => warn!("closing a board failed: {e}"),
        }
    }
    ctx.registry.lock().clear();
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: agent already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
