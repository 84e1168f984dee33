// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session verbs: which boards a session uses, and what the agent holds.

use std::time::Instant;

use mpr_core::{resolve, ErrorCode, ErrorReport, Port, SessionId};
use mpr_wire::{AgentStatus, Reply, SetupReply, Status};
use tracing::info;

use super::target::Target;
use super::ListenCtx;
use crate::env::{drain_timeout, PROTOCOL_VERSION, SESSION_IDLE_LIMIT};

/// Open the board and make it the caller's FG, or attach it as BG.
pub(super) async fn setup(
    ctx: &ListenCtx,
    target: &Target,
    background: bool,
) -> Result<Status, ErrorReport> {
    let Some(port) = target.explicit.clone() else {
        return Err(ErrorReport::new(ErrorCode::Usage, "setup needs a port"));
    };
    let conn = match ctx.connections.get_or_open(&port).await {
        Ok(conn) => conn,
        Err(e) => {
            let report = e.report();
            if report.code == ErrorCode::DeviceNotFound {
                ctx.forget_port(&port);
            }
            return Err(report);
        }
    };
    let port = conn.port().clone();
    {
        let mut registry = ctx.registry.lock();
        if background {
            registry.add_bg(&target.sid, port.clone(), Instant::now());
        } else {
            registry.set_fg(&target.sid, port.clone(), Instant::now());
        }
    }
    info!(sid = %target.sid, %port, background, "board attached to session");
    Ok(Status::reply(Reply::Setup(SetupReply {
        port: conn.port().clone(),
        info: conn.info().clone(),
        agent_endpoint: ctx.socket_path.clone(),
    })))
}

/// Switch the caller's FG to a board the agent already holds.
pub(super) fn fg(ctx: &ListenCtx, target: &Target) -> Result<Status, ErrorReport> {
    let Some(port) = target.explicit.clone() else {
        return Err(ErrorReport::new(ErrorCode::Usage, "fg needs a port"));
    };
    let Some(conn) = ctx.connections.get(&port) else {
        return Err(ErrorReport::new(
            ErrorCode::Usage,
            format!("{port} is not connected (run `mpr setup {port}` first)"),
        ));
    };
    let port = conn.port().clone();
    ctx.registry.lock().set_fg(&target.sid, port.clone(), Instant::now());
    Ok(Status::reply(Reply::Foreground { port }))
}

/// Close one board (explicit port, else the caller's FG), or every board
/// the caller's session refers to.
pub(super) async fn disconnect(
    ctx: &ListenCtx,
    target: &Target,
    all: bool,
) -> Result<Status, ErrorReport> {
    let conns = if all {
        let ports: Vec<Port> = {
            let mut registry = ctx.registry.lock();
            let session = registry.get_or_create(&target.sid, Instant::now());
            session.fg().into_iter().chain(session.bg()).cloned().collect()
        };
        let mut conns = Vec::with_capacity(ports.len());
        for port in ports {
            match ctx.connections.remove(&port) {
                Some(conn) => conns.push(conn),
                None => ctx.forget_port(&port),
            }
        }
        conns
    } else {
        let port = {
            let mut registry = ctx.registry.lock();
            let session = registry.get_or_create(&target.sid, Instant::now());
            resolve(target.explicit.as_ref(), Some(session), None)
                .map_err(|e| ErrorReport::new(ErrorCode::NoTarget, e.to_string()))?
                .port
        };
        match ctx.connections.remove(&port) {
            Some(conn) => vec![conn],
            None => {
                ctx.forget_port(&port);
                return Err(ErrorReport::new(
                    ErrorCode::Usage,
                    format!("{port} is not connected"),
                ));
            }
        }
    };

    let mut ports = Vec::with_capacity(conns.len());
    for conn in conns {
        conn.close(drain_timeout()).await;
        ctx.forget_port(conn.port());
        info!(sid = %target.sid, port = %conn.port(), "disconnected");
        ports.push(conn.port().clone());
    }
    Ok(Status::reply(Reply::Disconnected { ports }))
}

pub(super) fn status(ctx: &ListenCtx, sid: &SessionId) -> Status {
    collect_sessions(ctx);
    let now = Instant::now();
    let registry = ctx.registry.lock();
    Status::reply(Reply::Status(AgentStatus {
        version: PROTOCOL_VERSION.to_string(),
        pid: std::process::id(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        connections: ctx.connections.list().iter().map(|c| c.entry()).collect(),
        session: registry.view(sid, now),
        sessions: registry.list(now),
    }))
}

pub(super) fn ports(ctx: &ListenCtx) -> Result<Status, ErrorReport> {
    let ports = ctx.connections.available_ports().map_err(|e| {
        ErrorReport::new(ErrorCode::AgentInternal, format!("listing serial ports failed: {e}"))
    })?;
    Ok(Status::reply(Reply::Ports { ports }))
}

/// Forget sessions whose shell has exited, or that hold nothing and have
/// been idle for a while.
pub(crate) fn collect_sessions(ctx: &ListenCtx) {
    let removed = ctx.registry.lock().collect_garbage(Instant::now(), SESSION_IDLE_LIMIT, |sid| {
        sid.pid().is_none_or(process_alive)
    });
    for sid in removed {
        info!(%sid, "session forgotten");
    }
}

/// Whether a process with this pid still exists.
fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
