// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent startup: claim the state directory, then bind the socket.

use std::io::Write;
use std::time::Instant;

use fs2::FileExt;
use tokio::net::UnixListener;
use tracing::info;

use super::{AgentState, Config, LifecycleError, StartupResult};
use crate::env::PROTOCOL_VERSION;

/// Start the agent
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // A failed lock means the files belong to the running agent.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Lock FIRST. Opening without truncation keeps a running agent's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::write(&config.version_path, PROTOCOL_VERSION)?;

    // Bind LAST, only after everything else passed. A socket left by a
    // crashed agent is stale: we hold the lock, so nobody serves it.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(socket = %config.socket_path.display(), version = PROTOCOL_VERSION, "Agent started");

    Ok(StartupResult {
        agent: AgentState { config: config.clone(), lock_file, start_time: Instant::now() },
        listener,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
