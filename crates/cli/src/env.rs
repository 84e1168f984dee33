// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI.

use std::path::PathBuf;
use std::time::Duration;

use mpr_core::SessionId;

/// Resolve state directory: MPR_STATE_DIR > XDG_STATE_HOME/mpr > ~/.local/state/mpr
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("MPR_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("mpr"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/state/mpr"))
}

/// This terminal's session: `MPR_SESSION`, else the parent shell's pid.
pub fn session_id() -> SessionId {
    match std::env::var("MPR_SESSION") {
        Ok(sid) if !sid.trim().is_empty() => SessionId::new(sid.trim()),
        _ => SessionId::from_pid(std::os::unix::process::parent_id()),
    }
}

fn millis(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Connect / request-write timeout
pub fn ipc_timeout() -> Duration {
    millis("MPR_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// How long auto-start waits for the agent to answer.
pub fn start_timeout() -> Duration {
    millis("MPR_START_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Explicit agent binary, mostly for tests and packaging.
pub fn agent_binary() -> Option<PathBuf> {
    std::env::var_os("MPR_AGENT_BIN").map(PathBuf::from)
}

pub fn cargo_manifest_dir() -> Option<String> {
    std::env::var("CARGO_MANIFEST_DIR").ok()
}
