// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mpr: work with MicroPython boards through a background agent.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod color;
mod commands;
mod env;
mod exit_error;
mod output;
mod terminal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mpr_core::{exit_code, Port, Workspace};
use mpr_wire::Verb;

use crate::client::AgentClient;
use crate::commands::agent::AgentArgs;
use crate::commands::board::BoardCommand;
use crate::commands::{agent, board, session, Invocation};
use crate::exit_error::ExitError;
use crate::output::OutputFormat;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

#[derive(Parser)]
#[command(
    name = "mpr",
    version = VERSION,
    about = "Work with MicroPython boards through a background agent",
    styles = color::styles(),
)]
struct Cli {
    /// Board serial port; overrides the terminal's foreground and the workspace default
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Queue behind a busy board instead of failing
    #[arg(long, global = true)]
    wait: bool,

    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a board and make it this terminal's foreground
    Setup {
        #[arg(value_name = "PORT")]
        device: String,
        /// Also save it as the workspace default in .mpr.toml
        #[arg(long)]
        default: bool,
        /// Attach it in the background, keeping the current foreground
        #[arg(long, conflicts_with = "default")]
        bg: bool,
    },
    /// Switch this terminal's foreground to a connected board
    Fg {
        #[arg(value_name = "PORT")]
        device: String,
    },
    /// Close a board connection (default: the foreground)
    Disconnect {
        #[arg(value_name = "PORT")]
        device: Option<String>,
        /// Close every board this terminal uses
        #[arg(long, conflicts_with = "device")]
        all: bool,
    },
    /// Show connected boards and sessions
    Status,
    /// List serial ports
    Ports,
    #[command(flatten)]
    Board(BoardCommand),
    /// Manage the background agent
    Agent(AgentArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (code, message) = match e.downcast_ref::<ExitError>() {
                Some(exit) => (exit.code, exit.message.clone()),
                None => (exit_code::USER, format!("{e:#}")),
            };
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.output;
    if let Commands::Agent(args) = cli.command {
        return agent::handle(args, format).await;
    }

    let cwd = std::env::current_dir()?;
    let inv = Invocation {
        client: AgentClient::new().map_err(|e| ExitError::from(e.report()))?,
        sid: env::session_id(),
        port: cli.port.map(Port::new),
        default_port: workspace_default(&cwd)?,
        wait: cli.wait,
        format,
    };

    match cli.command {
        Commands::Setup { device, default, bg } => {
            session::setup(&inv, Port::new(device), default, bg, &workspace_dir(&cwd)).await
        }
        Commands::Fg { device } => session::fg(&inv, Port::new(device)).await,
        Commands::Disconnect { device, all } => {
            session::disconnect(&inv, device.map(Port::new), all).await
        }
        Commands::Status => inv.call_and_print(Verb::Status).await,
        Commands::Ports => inv.call_and_print(Verb::Ports).await,
        Commands::Board(command) => board::handle(&inv, command, &cwd).await,
        // Handled before the workspace lookup.
        Commands::Agent(_) => Ok(()),
    }
}

/// Symlinks resolved, so the same tree always finds the same workspace.
fn workspace_dir(cwd: &Path) -> PathBuf {
    std::fs::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf())
}

fn workspace_default(cwd: &Path) -> Result<Option<Port>> {
    let workspace = Workspace::discover(&workspace_dir(cwd))?;
    Ok(workspace.and_then(|ws| ws.default_port().cloned()))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
