// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mprd`: the mpr agent.
//!
//! Normally started on demand by `mpr`; `--foreground` also logs to stderr.

use std::sync::Arc;

use clap::Parser;
use mpr_daemon::connection::{ConnectionTable, SerialOpener};
use mpr_daemon::env::drain_timeout;
use mpr_daemon::lifecycle::{self, Config, LifecycleError};
use mpr_daemon::listener::{ListenCtx, Listener};
use mpr_daemon::logging::{self, STARTUP_FAILED};
use mpr_daemon::repl::Timeouts;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "mprd", version, about = "mpr board agent")]
struct Args {
    /// Also log to stderr
    #[arg(long)]
    foreground: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mprd: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::write_startup_marker(&config.log_path) {
        eprintln!("mprd: cannot write {}: {e}", config.log_path.display());
    }
    let _guard = match logging::init(&config.log_path, args.foreground) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("mprd: cannot open log {}: {e}", config.log_path.display());
            return std::process::ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        // Another agent owns the state directory; clients will find it.
        Err(LifecycleError::LockFailed(_)) => {
            info!("agent already running");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{STARTUP_FAILED}{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let lifecycle::StartupResult { mut agent, listener } = lifecycle::startup(&config).await?;

    let shutdown = Arc::new(Notify::new());
    let table = ConnectionTable::new(Arc::new(SerialOpener), Timeouts::default());
    let ctx = Arc::new(ListenCtx::new(table, config.socket_path.clone(), Arc::clone(&shutdown)));

    let accept = tokio::spawn(Listener::new(listener, Arc::clone(&ctx)).run());
    let upkeep = tokio::spawn(lifecycle::housekeeping(Arc::clone(&ctx)));

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = sigterm.recv() => info!("terminated"),
    }

    // Stop taking requests, then hand every board back.
    accept.abort();
    upkeep.abort();
    lifecycle::drain(&ctx, drain_timeout()).await;
    agent.shutdown()
}
