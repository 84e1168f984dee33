// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use mpr_core::{Port, SessionId};
use serde::{Deserialize, Serialize};

/// Request from client to agent.
///
/// On the wire the verb is flattened into the request object:
/// `{"sid": "...", "port": null, "verb": "ls", "args": {...}, "streaming": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Session of the calling terminal
    pub sid: SessionId,

    /// Board named on the command line; wins over session and workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,

    /// Workspace Default read by the client from `.mpr.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_port: Option<Port>,

    #[serde(flatten)]
    pub verb: Verb,

    /// Forward output as it arrives instead of once at the end
    #[serde(default)]
    pub streaming: bool,

    /// Queue behind an interactive session holding the board instead of
    /// failing with `board_busy`
    #[serde(default)]
    pub wait: bool,
}

impl Request {
    pub fn new(sid: SessionId, verb: Verb) -> Self {
        Self { sid, port: None, default_port: None, verb, streaming: false, wait: false }
    }

    pub fn port(mut self, port: Option<Port>) -> Self {
        self.port = port;
        self
    }

    pub fn default_port(mut self, port: Option<Port>) -> Self {
        self.default_port = port;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}

/// What the client asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", content = "args", rename_all = "snake_case")]
pub enum Verb {
    /// Liveness check; replies with the agent version
    Ping,

    /// Agent, connection and session overview
    Status,

    /// Serial ports visible to the OS
    Ports,

    /// Stop the agent
    Shutdown,

    /// Connect the request's port and attach it to this session, as FG
    /// unless `background`
    Setup {
        #[serde(default)]
        background: bool,
    },

    /// Switch this session's FG to the request's port
    Fg,

    /// Close the request's port (or the session FG), or every board the
    /// session refers to
    Disconnect {
        #[serde(default)]
        all: bool,
    },

    /// Run source code on the board
    Exec { code: String },

    /// Run a local script on the board
    Run {
        path: PathBuf,
        /// Return once the code is sent; the board stays busy until it finishes
        #[serde(default)]
        detach: bool,
    },

    /// Interactive REPL takeover
    Repl,

    /// Interrupt a program started with `run --detach`
    Stop,

    /// Soft reset
    Reset,

    /// Board identity
    Info,

    Ls {
        path: String,
        #[serde(default)]
        recursive: bool,
    },

    Cat { path: String },

    Get { remote: String, local: PathBuf },

    Put { local: PathBuf, remote: String },

    Rm {
        path: String,
        #[serde(default)]
        recursive: bool,
    },

    Mkdir { path: String },

    Rmdir { path: String },

    Stat { path: String },

    /// Copy on the board; a directory destination keeps the source name
    Cp {
        src: String,
        dest: String,
        #[serde(default)]
        recursive: bool,
    },

    Mv { src: String, dest: String },

    /// Create an empty file, or leave an existing one alone
    Touch { path: String },

    /// Wipe the board filesystem
    Format,

    /// Download a board directory tree
    Getdir { remote: String, local: PathBuf },

    /// Upload a local directory tree
    Putdir { local: PathBuf, remote: String },

    Mem,

    Df,
}

impl Verb {
    /// Verbs that run against a board and go through target resolution.
    pub fn is_board_directed(&self) -> bool {
        !matches!(
            self,
            Verb::Ping
                | Verb::Status
                | Verb::Ports
                | Verb::Shutdown
                | Verb::Setup { .. }
                | Verb::Fg
                | Verb::Disconnect { .. }
        )
    }

    /// Verbs that hold the board under a lease until the client lets go.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Verb::Repl | Verb::Run { detach: false, .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Ping => "ping",
            Verb::Status => "status",
            Verb::Ports => "ports",
            Verb::Shutdown => "shutdown",
            Verb::Setup { .. } => "setup",
            Verb::Fg => "fg",
            Verb::Disconnect { .. } => "disconnect",
            Verb::Exec { .. } => "exec",
            Verb::Run { .. } => "run",
            Verb::Repl => "repl",
            Verb::Stop => "stop",
            Verb::Reset => "reset",
            Verb::Info => "info",
            Verb::Ls { .. } => "ls",
            Verb::Cat { .. } => "cat",
            Verb::Get { .. } => "get",
            Verb::Put { .. } => "put",
            Verb::Rm { .. } => "rm",
            Verb::Mkdir { .. } => "mkdir",
            Verb::Rmdir { .. } => "rmdir",
            Verb::Stat { .. } => "stat",
            Verb::Cp { .. } => "cp",
            Verb::Mv { .. } => "mv",
            Verb::Touch { .. } => "touch",
            Verb::Format => "format",
            Verb::Getdir { .. } => "getdir",
            Verb::Putdir { .. } => "putdir",
            Verb::Mem => "mem",
            Verb::Df => "df",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
