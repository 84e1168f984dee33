// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

/// Resolve state directory: MPR_STATE_DIR > XDG_STATE_HOME/mpr > ~/.local/state/mpr
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MPR_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("mpr"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/mpr"))
}

fn millis(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Request read / frame write timeout
pub fn ipc_timeout() -> Duration {
    millis("MPR_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Bound on closing connections at shutdown (default 5s).
pub fn drain_timeout() -> Duration {
    millis("MPR_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Stop after this long with no connections and no requests. Unset means never.
pub fn idle_timeout() -> Option<Duration> {
    millis("MPR_IDLE_TIMEOUT_MS").filter(|d| !d.is_zero())
}

/// How often idle connections are pinged.
pub fn heartbeat_interval() -> Duration {
    millis("MPR_HEARTBEAT_MS").filter(|d| !d.is_zero()).unwrap_or(Duration::from_secs(30))
}

/// Sessions with no boards are forgotten after this long.
pub const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(10 * 60);
