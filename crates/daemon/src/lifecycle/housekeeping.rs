// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic upkeep: ping idle boards, forget dead ones, collect sessions,
//! and stop the agent once it has been idle long enough.

use std::sync::Arc;
use std::time::Duration;

use mpr_core::SessionId;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Job};
use crate::env::{heartbeat_interval, idle_timeout};
use crate::listener::{collect_sessions, ListenCtx};

/// Run until shutdown is requested (by the idle limit or anyone else).
pub async fn housekeeping(ctx: Arc<ListenCtx>) {
    let period = heartbeat_interval();
    let idle_limit = idle_timeout();
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    tick.tick().await;

    loop {
        tick.tick().await;
        sweep(&ctx, period).await;
        if idle_expired(&ctx, idle_limit) {
            info!(idle_secs = ctx.idle_for().as_secs(), "no boards and no requests, stopping");
            ctx.request_shutdown();
            return;
        }
    }
}

/// One round of upkeep.
pub(crate) async fn sweep(ctx: &ListenCtx, idle_after: Duration) {
    for conn in ctx.connections.list() {
        if conn.is_dead() {
            ctx.forget_port(conn.port());
        } else if conn.idle_for() >= idle_after {
            heartbeat(ctx, conn).await;
        }
    }
    collect_sessions(ctx);
}

fn idle_expired(ctx: &ListenCtx, limit: Option<Duration>) -> bool {
    limit.is_some_and(|limit| ctx.connections.is_empty() && ctx.idle_for() >= limit)
}

/// Run `pass` on a board nobody is using. Busy boards are evidently alive.
async fn heartbeat(ctx: &ListenCtx, conn: Arc<Connection>) {
    let job = Job { sid: SessionId::new("agent"), verb: "heartbeat", leased: false, wait: false };
    let Some(lease) = conn.try_acquire(job) else {
        return;
    };
    let outcome = tokio::task::spawn_blocking(move || {
        lease.run(|engine, cancel| engine.exec_capture("pass", cancel))
    })
    .await;
    match conn.settle(outcome) {
        Ok(_) => debug!(port = %conn.port(), "heartbeat ok"),
        Err(e) if e.is_device_gone() => {
            warn!(port = %conn.port(), error = %e, "board stopped answering");
            ctx.forget_port(conn.port());
        }
        Err(e) => warn!(port = %conn.port(), error = %e, "heartbeat failed"),
    }
}

#[cfg(test)]
#[path = "housekeeping_tests.rs"]
mod tests;
