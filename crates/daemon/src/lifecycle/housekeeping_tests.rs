// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{Duration, Instant};

use mpr_core::{Port, SessionId};
use mpr_wire::Verb;

use super::*;
use crate::listener::test_fixtures::*;

#[tokio::test]
async fn idle_board_is_pinged() {
    let harness = Harness::new();
    let board = harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;

    sweep(&harness.ctx, Duration::ZERO).await;

    let executed = board.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].trim(), "pass");
    assert_eq!(harness.ctx.connections.len(), 1);
}

#[tokio::test]
async fn recently_used_board_is_left_alone() {
    let harness = Harness::new();
    let board = harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;

    sweep(&harness.ctx, Duration::from_secs(60)).await;

    assert!(board.executed().is_empty());
}

#[tokio::test]
async fn unplugged_board_is_forgotten_everywhere() {
    let harness = Harness::new();
    let board = harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;
    harness.send(on("s-b", PICO, Verb::Fg)).await;

    board.unplug();
    sweep(&harness.ctx, Duration::ZERO).await;

    assert!(harness.ctx.connections.is_empty());
    assert!(harness.ctx.registry.lock().sessions_using(&Port::new(PICO)).is_empty());
}

#[tokio::test]
async fn busy_board_is_not_pinged() {
    let harness = Harness::new();
    let board = harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;
    let conn = harness.ctx.connections.get(&Port::new(PICO)).unwrap();
    let job = Job { sid: SessionId::new("s-a"), verb: "repl", leased: true, wait: false };
    let lease = conn.acquire(job).await.unwrap();

    sweep(&harness.ctx, Duration::ZERO).await;

    assert!(board.executed().is_empty());
    assert_eq!(harness.ctx.connections.len(), 1);
    drop(lease);
}

#[tokio::test]
async fn dead_connection_is_dropped_without_probing() {
    let harness = Harness::new();
    let board = harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;
    harness.ctx.connections.get(&Port::new(PICO)).unwrap().mark_dead();

    sweep(&harness.ctx, Duration::ZERO).await;

    assert!(harness.ctx.connections.is_empty());
    assert!(board.executed().is_empty());
}

#[tokio::test]
async fn sweep_collects_stale_sessions() {
    let harness = Harness::new();
    let gone = SessionId::from_pid(i32::MAX as u32 - 11);
    harness.ctx.registry.lock().set_fg(&gone, Port::new(PICO), Instant::now());

    sweep(&harness.ctx, Duration::ZERO).await;

    assert!(harness.ctx.registry.lock().get(&gone).is_none());
}

#[test]
fn idle_limit_needs_no_connections() {
    let harness = Harness::new();
    assert!(!idle_expired(&harness.ctx, None));
    assert!(idle_expired(&harness.ctx, Some(Duration::ZERO)));
    assert!(!idle_expired(&harness.ctx, Some(Duration::from_secs(3600))));
}

#[tokio::test]
async fn open_board_keeps_the_agent_alive() {
    let harness = Harness::new();
    harness.plug(PICO);
    harness.send(on("s-a", PICO, SETUP)).await;

    assert!(!idle_expired(&harness.ctx, Some(Duration::ZERO)));
}
