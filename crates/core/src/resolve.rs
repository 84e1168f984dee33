// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target resolution for board-directed requests.
//!
//! Precedence, first match wins:
//! 1. an explicit port named by the request (session untouched)
//! 2. the session's FG
//! 3. the workspace Default, which becomes the session's FG
//! 4. otherwise `NoTarget`
//!
//! Every board-directed verb resolves through [`resolve`]; handlers never
//! re-derive the target themselves.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::Port;
use crate::registry::Session;

/// Which rule produced the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Explicit,
    Foreground,
    Default,
}

crate::simple_display! {
    TargetSource {
        Explicit => "explicit",
        Foreground => "foreground",
        Default => "default",
    }
}

/// The board a request will run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub port: Port,
    pub source: TargetSource,
}

impl Resolution {
    /// Whether the caller must record `port` as its session FG.
    pub fn promotes_to_fg(&self) -> bool {
        self.source == TargetSource::Default
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no target board: this session has no foreground board and the workspace has no default (run `mpr setup <port>`)")]
    NoTarget,
}

/// Pick the board for a request. Pure: same inputs, same answer.
pub fn resolve(
    explicit: Option<&Port>,
    session: Option<&Session>,
    default: Option<&Port>,
) -> Result<Resolution, ResolveError> {
    if let Some(port) = explicit {
        return Ok(Resolution { port: port.normalized(), source: TargetSource::Explicit });
    }
    if let Some(port) = session.and_then(Session::fg) {
        return Ok(Resolution { port: port.clone(), source: TargetSource::Foreground });
    }
    if let Some(port) = default {
        return Ok(Resolution { port: port.normalized(), source: TargetSource::Default });
    }
    Err(ResolveError::NoTarget)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
