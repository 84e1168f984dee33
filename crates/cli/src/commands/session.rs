// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session commands: choosing boards and inspecting what the agent holds.

use std::path::{Path, PathBuf};

use anyhow::Result;
use mpr_core::{Port, Workspace};
use mpr_wire::{Reply, SetupReply, Verb};

use super::Invocation;
use crate::output::{print_reply, OutputFormat};

/// Connect `port`, attach it to this terminal (as FG unless `background`),
/// and record it in `.mpr.toml`.
pub async fn setup(
    inv: &Invocation,
    port: Port,
    make_default: bool,
    background: bool,
    cwd: &Path,
) -> Result<()> {
    let request = inv.request(Verb::Setup { background }).port(Some(port));
    let Some(reply) = inv.call(request).await? else {
        return Ok(());
    };
    if let Reply::Setup(setup) = &reply {
        if let Some(saved) = record(setup, make_default, cwd)? {
            if inv.format == OutputFormat::Text {
                println!("Default saved to {}", saved.display());
            }
        }
    }
    print_reply(&reply, inv.format)
}

/// Persist board metadata. `--default` creates the workspace if needed;
/// otherwise an existing workspace only caches the board details.
///
/// Returns the config path when the Default changed.
pub fn record(setup: &SetupReply, make_default: bool, cwd: &Path) -> Result<Option<PathBuf>> {
    if make_default {
        let mut workspace = Workspace::discover_or_create(cwd)?;
        workspace.set_default(&setup.port, &setup.info, Some(setup.agent_endpoint.clone()));
        return Ok(Some(workspace.save()?));
    }
    if let Some(mut workspace) = Workspace::discover(cwd)? {
        workspace.remember_board(&setup.port, &setup.info);
        workspace.save()?;
    }
    Ok(None)
}

pub async fn fg(inv: &Invocation, port: Port) -> Result<()> {
    let request = inv.request(Verb::Fg).port(Some(port));
    if let Some(reply) = inv.call(request).await? {
        print_reply(&reply, inv.format)?;
    }
    Ok(())
}

pub async fn disconnect(inv: &Invocation, port: Option<Port>, all: bool) -> Result<()> {
    let request = inv.request(Verb::Disconnect { all }).port(port.or_else(|| inv.port.clone()));
    if let Some(reply) = inv.call(request).await? {
        print_reply(&reply, inv.format)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
