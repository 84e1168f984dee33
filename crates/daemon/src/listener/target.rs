// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one place board-directed requests pick their board.

use std::sync::Arc;
use std::time::Instant;

use mpr_core::{resolve, ErrorCode, ErrorReport, Port, Resolution, SessionId};
use mpr_wire::Request;
use tracing::debug;

use super::ListenCtx;
use crate::connection::Connection;

/// Who is asking, and which boards they named.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub sid: SessionId,
    pub explicit: Option<Port>,
    pub default: Option<Port>,
    pub wait: bool,
}

impl Target {
    pub(crate) fn of(request: &Request) -> Self {
        Self {
            sid: request.sid.clone(),
            explicit: request.port.clone(),
            default: request.default_port.clone(),
            wait: request.wait,
        }
    }
}

/// Explicit port, else the session's FG, else the workspace default.
pub(crate) fn resolve_target(ctx: &ListenCtx, target: &Target) -> Result<Resolution, ErrorReport> {
    let mut registry = ctx.registry.lock();
    let session = registry.get_or_create(&target.sid, Instant::now());
    let resolution = resolve(target.explicit.as_ref(), Some(session), target.default.as_ref())
        .map_err(|e| ErrorReport::new(ErrorCode::NoTarget, e.to_string()))?;
    debug!(
        sid = %target.sid,
        port = %resolution.port,
        source = %resolution.source,
        "resolved target"
    );
    Ok(resolution)
}

/// Resolve, open the board if needed, and promote a default to FG.
pub(crate) async fn connect(
    ctx: &ListenCtx,
    target: &Target,
) -> Result<Arc<Connection>, ErrorReport> {
    let resolution = resolve_target(ctx, target)?;
    let conn = match ctx.connections.get_or_open(&resolution.port).await {
        Ok(conn) => conn,
        Err(e) => {
            let report = e.report();
            if report.code == ErrorCode::DeviceNotFound {
                ctx.forget_port(&resolution.port);
            }
            return Err(report);
        }
    };
    if resolution.promotes_to_fg() {
        ctx.registry.lock().set_fg(&target.sid, resolution.port.clone(), Instant::now());
    }
    Ok(conn)
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
