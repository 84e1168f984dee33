// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mpr_core::{exit_code, ErrorReport};
use serde::{Deserialize, Serialize};

use crate::Reply;

/// One message of a response stream, agent to client.
///
/// Serialized as `{"kind": "stdout", "payload": "..."}`. Every stream ends
/// with exactly one `Status` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Frame {
    Stdout(String),
    Stderr(String),
    Status(Status),
    Error(ErrorReport),
}

impl Frame {
    pub fn is_final(&self) -> bool {
        matches!(self, Frame::Status(_))
    }
}

/// Final frame of a response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply>,
}

impl Status {
    pub fn ok() -> Self {
        Self { exit_code: exit_code::SUCCESS, reply: None }
    }

    pub fn reply(reply: Reply) -> Self {
        Self { exit_code: exit_code::SUCCESS, reply: Some(reply) }
    }

    pub fn failed(report: &ErrorReport) -> Self {
        Self { exit_code: report.exit_code(), reply: None }
    }

    pub fn success(&self) -> bool {
        self.exit_code == exit_code::SUCCESS
    }
}

/// Client to agent traffic during an interactive takeover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Input {
    /// Keystrokes for the board
    Data(String),
    /// Ctrl-C for the running program
    Interrupt,
    /// Release the board
    Exit,
}
