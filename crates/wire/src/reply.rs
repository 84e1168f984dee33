// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured results carried by the final status frame.

use std::path::PathBuf;

use mpr_core::{BoardInfo, Port, SessionId, SessionView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Pong { version: String },

    Status(AgentStatus),

    Ports { ports: Vec<PortEntry> },

    ShuttingDown,

    Setup(SetupReply),

    Foreground { port: Port },

    Disconnected { ports: Vec<Port> },

    Info { port: Port, info: BoardInfo, root: String },

    Entries { entries: Vec<FileEntry> },

    Stat(FileEntry),

    Mem(MemInfo),

    Df(DfInfo),

    /// File transfer completed
    Transferred { bytes: u64 },

    /// Copy or tree transfer completed
    Files { files: u64, bytes: u64 },

    /// `run --detach` handed the program to the board
    Detached { port: Port },
}

/// Result of `setup`; the client persists it as the workspace Default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupReply {
    pub port: Port,
    pub info: BoardInfo,
    pub agent_endpoint: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub version: String,
    pub pid: u32,
    pub uptime_secs: u64,
    pub connections: Vec<ConnectionEntry>,
    /// The caller's own session
    pub session: Option<SessionView>,
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub port: Port,
    pub info: BoardInfo,
    /// Verb currently holding the execution lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy: Option<String>,
    /// Session holding an interactive lease
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leased_by: Option<SessionId>,
    pub dead: bool,
    /// When the board answered raw-paste negotiation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_paste: Option<bool>,
    pub connected_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub port: Port,
    pub description: String,
    /// The agent holds a connection to this port
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfo {
    pub free: u64,
    pub alloc: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}
