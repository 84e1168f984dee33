// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mpr agent` - Background agent management

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use mpr_wire::{AgentStatus, Frame, Reply, Request, Verb};

use crate::client::{find_mprd_binary, AgentClient, ClientError};
use crate::env;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, format_uptime, OutputFormat};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Start the agent (background unless --foreground)
    Start {
        /// Run in foreground, logging to stderr too
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the agent, closing every board
    Stop,
    /// Check whether the agent is running
    Status,
    /// Stop and start the agent
    Restart,
    /// Show recent agent log lines
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
    },
}

pub async fn handle(args: AgentArgs, format: OutputFormat) -> Result<()> {
    let client = AgentClient::new().map_err(|e| ExitError::from(e.report()))?;
    match args.command {
        AgentCommand::Start { foreground } => start(&client, foreground).await,
        AgentCommand::Stop => stop(&client).await,
        AgentCommand::Status => status(&client, format).await,
        AgentCommand::Restart => {
            stop_agent(&client).await?;
            client.connect_or_start().await.map_err(|e| ExitError::from(e.report()))?;
            println!("Agent restarted");
            Ok(())
        }
        AgentCommand::Logs { limit } => logs(&client.log_path(), limit),
    }
}

async fn start(client: &AgentClient, foreground: bool) -> Result<()> {
    if foreground {
        let binary = find_mprd_binary();
        let status = Command::new(&binary)
            .arg("--foreground")
            .env("MPR_STATE_DIR", client.state_dir())
            .status()
            .map_err(|e| anyhow!("cannot launch {}: {e}", binary.display()))?;
        if !status.success() {
            return Err(anyhow!("Agent exited with status: {status}"));
        }
        return Ok(());
    }

    if let Ok(version) = client.ping().await {
        println!("Agent already running ({version})");
        return Ok(());
    }
    client.connect_or_start().await.map_err(|e| ExitError::from(e.report()))?;
    println!("Agent started");
    Ok(())
}

async fn stop(client: &AgentClient) -> Result<()> {
    if stop_agent(client).await? {
        println!("Agent stopped");
    } else {
        println!("Agent already stopped");
    }
    Ok(())
}

async fn stop_agent(client: &AgentClient) -> Result<bool> {
    client.stop().await.map_err(|e| ExitError::from(e.report()).into())
}

async fn status(client: &AgentClient, format: OutputFormat) -> Result<()> {
    let status = match fetch_status(client).await {
        Ok(status) => status,
        Err(e) if e.is_not_running() => {
            let obj = serde_json::json!({ "status": "not_running" });
            return format_or_json(format, &obj, || println!("Agent not running"));
        }
        Err(e) => return Err(ExitError::from(e.report()).into()),
    };

    let obj = serde_json::json!({
        "status": "running",
        "version": status.version,
        "pid": status.pid,
        "uptime_secs": status.uptime_secs,
        "connections": status.connections.len(),
        "socket": client.socket_path(),
    });
    format_or_json(format, &obj, || {
        println!("Status: running");
        println!("Version: {}", status.version);
        println!("PID: {}", status.pid);
        println!("Uptime: {}", format_uptime(status.uptime_secs));
        println!("Boards: {} connected", status.connections.len());
        println!("Socket: {}", client.socket_path().display());
    })
}

async fn fetch_status(client: &AgentClient) -> Result<AgentStatus, ClientError> {
    let request = Request::new(env::session_id(), Verb::Status);
    let mut exchange = client.open(&request, false).await?;
    loop {
        if let Frame::Status(status) = exchange.next_frame().await? {
            return match status.reply {
                Some(Reply::Status(status)) => Ok(status),
                other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
            };
        }
    }
}

fn logs(path: &Path, limit: usize) -> Result<()> {
    if !path.exists() {
        println!("No log file found at {}", path.display());
        return Ok(());
    }
    print!("{}", read_last_lines(path, limit)?);
    Ok(())
}

fn read_last_lines(path: &Path, n: usize) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let lines: Vec<String> = BufReader::new(file).lines().collect::<std::io::Result<_>>()?;
    let start = lines.len().saturating_sub(n);
    let mut text = lines[start..].join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
