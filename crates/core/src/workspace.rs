// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace Default board, persisted in `.mpr.toml`.
//!
//! The workspace root is the nearest ancestor of the working directory that
//! contains the marker file. The filesystem root never counts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::BoardInfo;
use crate::id::Port;

/// Marker and config file name.
pub const MARKER_FILE: &str = ".mpr.toml";

/// Board used when a session has no FG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultConnection {
    pub port: Port,
    #[serde(default)]
    pub core: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub version: String,
    /// Agent socket that was live when the default was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_endpoint: Option<PathBuf>,
}

/// Contents of `.mpr.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultConnection>,
    /// Board metadata cached by `setup`, keyed by port
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub boards: BTreeMap<String, BoardInfo>,
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("the filesystem root cannot hold a workspace config")]
    RootNotAllowed,

    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to write {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("invalid {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to encode workspace config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// A loaded workspace config and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: WorkspaceConfig,
}

impl Workspace {
    /// Find and load the workspace enclosing `start`, if any.
    pub fn discover(start: &Path) -> Result<Option<Self>, WorkspaceError> {
        match find_root(start) {
            Some(root) => {
                let config = load(&root)?;
                Ok(Some(Self { root, config }))
            }
            None => Ok(None),
        }
    }

    /// The enclosing workspace, or a fresh one rooted at `start`.
    pub fn discover_or_create(start: &Path) -> Result<Self, WorkspaceError> {
        if let Some(ws) = Self::discover(start)? {
            return Ok(ws);
        }
        if start.parent().is_none() {
            return Err(WorkspaceError::RootNotAllowed);
        }
        Ok(Self { root: start.to_path_buf(), config: WorkspaceConfig::default() })
    }

    pub fn default_port(&self) -> Option<&Port> {
        self.config.default.as_ref().map(|d| &d.port)
    }

    /// Record `port` as the Default, superseding any previous one.
    pub fn set_default(&mut self, port: &Port, info: &BoardInfo, agent_endpoint: Option<PathBuf>) {
        self.config.default = Some(DefaultConnection {
            port: port.clone(),
            core: info.core.clone(),
            device: info.device.clone(),
            version: info.version.clone(),
            agent_endpoint,
        });
        self.remember_board(port, info);
    }

    pub fn remember_board(&mut self, port: &Port, info: &BoardInfo) {
        self.config.boards.insert(port.to_string(), info.clone());
    }

    pub fn save(&self) -> Result<PathBuf, WorkspaceError> {
        let path = self.root.join(MARKER_FILE);
        let text = toml::to_string_pretty(&self.config)?;
        std::fs::write(&path, text).map_err(|e| WorkspaceError::Write(path.clone(), e))?;
        Ok(path)
    }
}

/// Nearest ancestor of `start` (inclusive) holding [`MARKER_FILE`].
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .filter(|dir| dir.parent().is_some())
        .find(|dir| dir.join(MARKER_FILE).is_file())
        .map(Path::to_path_buf)
}

fn load(root: &Path) -> Result<WorkspaceConfig, WorkspaceError> {
    let path = root.join(MARKER_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| WorkspaceError::Read(path.clone(), e))?;
    toml::from_str(&text).map_err(|e| WorkspaceError::Parse(path, e))
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
