// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent log setup.
//!
//! Everything goes to `agent.log` in the state directory. Each start appends
//! a marker line first, so a client that spawned the agent can find the
//! error from *this* attempt even when the log holds older runs.

use std::io::Write;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Line written before anything else on each start.
pub fn startup_marker(pid: u32) -> String {
    format!("--- mprd: starting (pid: {pid}) ---")
}

/// Prefix of the line logged when startup fails; clients search for it.
pub const STARTUP_FAILED: &str = "failed to start agent: ";

pub fn write_startup_marker(log_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}", startup_marker(std::process::id()))
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
///
/// Keep the guard alive for the life of the process; dropping it flushes
/// buffered lines.
pub fn init(log_path: &Path, foreground: bool) -> std::io::Result<WorkerGuard> {
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_path.file_name().unwrap_or_else(|| "agent.log".as_ref());
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
    let stderr_layer =
        foreground.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    // A subscriber may already be set (tests); keep it.
    let _ = tracing_subscriber::registry().with(filter).with(file_layer).with(stderr_layer).try_init();
    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
