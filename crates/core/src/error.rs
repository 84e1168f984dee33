// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the agent and the client.
//!
//! Every failure falls into one of four kinds, each with its own exit
//! code, because the remedy differs: fix the command, pick a board, check
//! the board, or restart the agent.

use serde::{Deserialize, Serialize};

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad command usage or local file problems; never retried
    User,
    /// No board could be chosen for the request
    TargetResolution,
    /// The board is busy, missing, or misbehaving on the wire
    Device,
    /// The agent process itself failed (bind, unreachable, internal)
    Agent,
}

crate::simple_display! {
    ErrorKind {
        User => "user error",
        TargetResolution => "no target",
        Device => "device error",
        Agent => "agent error",
    }
}

/// Specific failure reported in an error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Usage,
    LocalIo,
    TooManyConnections,
    NoTarget,
    DeviceBusy,
    BoardBusy,
    DeviceNotFound,
    ProtocolTimeout,
    TransferCorrupted,
    RemoteException,
    Interrupted,
    AgentBind,
    AgentUnreachable,
    AgentInternal,
}

impl ErrorCode {
    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::Usage | ErrorCode::LocalIo | ErrorCode::TooManyConnections => {
                ErrorKind::User
            }
            ErrorCode::NoTarget => ErrorKind::TargetResolution,
            ErrorCode::DeviceBusy
            | ErrorCode::BoardBusy
            | ErrorCode::DeviceNotFound
            | ErrorCode::ProtocolTimeout
            | ErrorCode::TransferCorrupted
            | ErrorCode::RemoteException
            | ErrorCode::Interrupted => ErrorKind::Device,
            ErrorCode::AgentBind | ErrorCode::AgentUnreachable | ErrorCode::AgentInternal => {
                ErrorKind::Agent
            }
        }
    }

    /// Process exit code a client should use for this failure.
    pub fn exit_code(self) -> i32 {
        match self {
            // The board ran the program and it raised
            ErrorCode::RemoteException => exit_code::REMOTE_FAILURE,
            // Ctrl-C: conventional 128 + SIGINT
            ErrorCode::Interrupted => exit_code::INTERRUPTED,
            other => other.kind().exit_code(),
        }
    }
}

crate::simple_display! {
    ErrorCode {
        Usage => "usage",
        LocalIo => "local_io",
        TooManyConnections => "too_many_connections",
        NoTarget => "no_target",
        DeviceBusy => "device_busy",
        BoardBusy => "board_busy",
        DeviceNotFound => "device_not_found",
        ProtocolTimeout => "protocol_timeout",
        TransferCorrupted => "transfer_corrupted",
        RemoteException => "remote_exception",
        Interrupted => "interrupted",
        AgentBind => "agent_bind",
        AgentUnreachable => "agent_unreachable",
        AgentInternal => "agent_internal",
    }
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::User => exit_code::USER,
            ErrorKind::TargetResolution => exit_code::NO_TARGET,
            ErrorKind::Device => exit_code::DEVICE,
            ErrorKind::Agent => exit_code::AGENT,
        }
    }
}

/// Client process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const REMOTE_FAILURE: i32 = 1;
    pub const USER: i32 = 2;
    pub const NO_TARGET: i32 = 3;
    pub const DEVICE: i32 = 4;
    pub const AGENT: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}

/// Error as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { kind: code.kind(), code, message: message.into() }
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    /// One-line remediation hint for the terminal.
    pub fn hint(&self) -> Option<&'static str> {
        match self.code {
            ErrorCode::NoTarget => Some("run `mpr setup <port>` or pass `--port`"),
            ErrorCode::BoardBusy => Some("wait for the other session, or pass `--wait`"),
            ErrorCode::DeviceBusy => Some("another program has the port open"),
            ErrorCode::DeviceNotFound => Some("check the cable, then `mpr ports`"),
            ErrorCode::AgentUnreachable | ErrorCode::AgentBind => {
                Some("see `mpr agent logs`")
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorReport {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
