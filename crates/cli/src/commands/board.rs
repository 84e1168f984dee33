// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board commands. Each becomes one request against the resolved board.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Subcommand;
use mpr_wire::Verb;

use super::{repl, Invocation};

#[derive(Subcommand)]
pub enum BoardCommand {
    /// Run Python source on the board
    Exec {
        /// Source code; `-` reads it from stdin
        code: String,
    },
    /// Run a local script on the board
    Run {
        /// Local script path
        path: PathBuf,
        /// Return once the script is sent; `mpr stop` interrupts it
        #[arg(short, long)]
        detach: bool,
    },
    /// Interrupt a program started with `run --detach`
    Stop,
    /// Interactive REPL (Ctrl-] to leave)
    Repl,
    /// Soft reset the board
    Reset,
    /// Show board identity
    Info,
    /// List files on the board
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print a file from the board
    Cat { path: String },
    /// Copy a file from the board
    Get {
        remote: String,
        /// Local destination (default: the file name in the current directory)
        local: Option<PathBuf>,
    },
    /// Copy a file to the board
    Put {
        local: PathBuf,
        /// Board destination (default: the local file name)
        remote: Option<String>,
    },
    /// Remove a file on the board
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create a directory on the board
    Mkdir { path: String },
    /// Remove an empty directory on the board
    Rmdir { path: String },
    /// Show size and type of a board path
    Stat { path: String },
    /// Copy on the board
    Cp {
        src: String,
        dest: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move or rename on the board
    Mv { src: String, dest: String },
    /// Create an empty file, or leave an existing one alone
    Touch { path: String },
    /// Erase the board filesystem
    Format {
        /// Confirm that every file on the board may be lost
        #[arg(long)]
        yes: bool,
    },
    /// Copy a directory tree from the board
    Getdir {
        remote: String,
        /// Local destination (default: the directory name in the current directory)
        local: Option<PathBuf>,
    },
    /// Copy a local directory tree to the board
    Putdir {
        local: PathBuf,
        /// Board destination (default: the local directory name under `/`)
        remote: Option<String>,
    },
    /// Show board heap usage
    Mem,
    /// Show board filesystem usage
    Df,
}

pub async fn handle(inv: &Invocation, command: BoardCommand, cwd: &Path) -> Result<()> {
    let verb = into_verb(command, cwd)?;
    match verb {
        Verb::Repl | Verb::Run { detach: false, .. } => repl::takeover(inv, verb).await,
        verb => inv.call_and_print(verb).await,
    }
}

/// Build the request verb. Local paths are made absolute since the agent
/// does not share the client's working directory.
pub fn into_verb(command: BoardCommand, cwd: &Path) -> Result<Verb> {
    Ok(match command {
        BoardCommand::Exec { code } if code == "-" => {
            Verb::Exec { code: std::io::read_to_string(std::io::stdin())? }
        }
        BoardCommand::Exec { code } => Verb::Exec { code },
        BoardCommand::Run { path, detach } => Verb::Run { path: cwd.join(path), detach },
        BoardCommand::Stop => Verb::Stop,
        BoardCommand::Repl => Verb::Repl,
        BoardCommand::Reset => Verb::Reset,
        BoardCommand::Info => Verb::Info,
        BoardCommand::Ls { path, recursive } => Verb::Ls { path, recursive },
        BoardCommand::Cat { path } => Verb::Cat { path },
        BoardCommand::Get { remote, local } => {
            let local = match local {
                Some(local) => cwd.join(local),
                None => cwd.join(file_name(&remote)?),
            };
            Verb::Get { remote, local }
        }
        BoardCommand::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => file_name(&local.to_string_lossy())?.to_string(),
            };
            Verb::Put { local: cwd.join(local), remote }
        }
        BoardCommand::Rm { path, recursive } => Verb::Rm { path, recursive },
        BoardCommand::Mkdir { path } => Verb::Mkdir { path },
        BoardCommand::Rmdir { path } => Verb::Rmdir { path },
        BoardCommand::Stat { path } => Verb::Stat { path },
        BoardCommand::Cp { src, dest, recursive } => Verb::Cp { src, dest, recursive },
        BoardCommand::Mv { src, dest } => Verb::Mv { src, dest },
        BoardCommand::Touch { path } => Verb::Touch { path },
        BoardCommand::Format { yes: false } => {
            bail!("format erases every file on the board; pass --yes to go ahead")
        }
        BoardCommand::Format { yes: true } => Verb::Format,
        BoardCommand::Getdir { remote, local } => {
            let local = match local {
                Some(local) => cwd.join(local),
                None if remote.trim_matches('/').is_empty() => cwd.to_path_buf(),
                None => cwd.join(file_name(&remote)?),
            };
            Verb::Getdir { remote, local }
        }
        BoardCommand::Putdir { local, remote } => {
            let local = cwd.join(local);
            let remote = match remote {
                Some(remote) => remote,
                None => match local.file_name() {
                    Some(name) => format!("/{}", name.to_string_lossy()),
                    None => bail!("cannot take a directory name from {local:?}; give a destination"),
                },
            };
            Verb::Putdir { local, remote }
        }
        BoardCommand::Mem => Verb::Mem,
        BoardCommand::Df => Verb::Df,
    })
}

fn file_name(path: &str) -> Result<&str> {
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => bail!("cannot take a file name from {path:?}; give a destination"),
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
