// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board-directed verbs that run to completion on their own.

use std::path::Path;
use std::sync::Arc;

use mpr_core::{ErrorCode, ErrorReport};
use mpr_wire::{Frame, Reply, Status, Verb};
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::sink::{FrameTx, LogConsole, SinkConsole};
use super::target::{self, Target};
use super::{tree, ListenCtx};
use crate::connection::{Connection, ExecError, Job};
use crate::repl::{format_script, Tally};

pub(super) async fn handle(
    ctx: &ListenCtx,
    target: &Target,
    verb: Verb,
    tx: &FrameTx,
) -> Result<Status, ErrorReport> {
    let conn = target::connect(ctx, target).await?;
    let port = conn.port().clone();
    if target.wait {
        if let Some(holder) = conn.blocked_by() {
            let _ = tx.send(Frame::Stderr(format!(
                "{port} is in use by session {holder}, waiting...\n"
            )));
        }
    }
    let job = Job { sid: target.sid.clone(), verb: verb.name(), leased: false, wait: target.wait };
    let failed = |e: ExecError| ctx.board_error(&port, e);

    match verb {
        Verb::Exec { code } => {
            let tx = tx.clone();
            conn.execute(job, move |engine, cancel| {
                let mut console = SinkConsole::new(tx, cancel);
                engine.exec(code.as_bytes(), &mut console, None)
            })
            .await
            .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Run { path, detach: true } => run_detached(ctx, conn, job, &path).await,

        Verb::Reset => {
            conn.execute(job, |engine, _| engine.soft_reset()).await.map_err(failed)?;
            info!(%port, "soft reset");
            Ok(Status::ok())
        }

        Verb::Info => Ok(Status::reply(Reply::Info {
            port: port.clone(),
            info: conn.info().clone(),
            root: conn.info().root().to_string(),
        })),

        Verb::Ls { path, recursive } => {
            let entries = conn
                .execute(job, move |engine, cancel| engine.ls(&path, recursive, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::reply(Reply::Entries { entries }))
        }

        Verb::Cat { path } => {
            let tx = tx.clone();
            conn.execute(job, move |engine, cancel| {
                let mut console = SinkConsole::new(tx, cancel);
                engine.cat(&path, &mut console)
            })
            .await
            .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Get { remote, local } => {
            let data = conn
                .execute(job, move |engine, cancel| engine.get(&remote, cancel))
                .await
                .map_err(failed)?;
            tokio::fs::write(&local, &data).await.map_err(|e| {
                ErrorReport::new(ErrorCode::LocalIo, format!("cannot write {}: {e}", local.display()))
            })?;
            Ok(Status::reply(Reply::Transferred { bytes: data.len() as u64 }))
        }

        Verb::Put { local, remote } => {
            let data = tokio::fs::read(&local).await.map_err(|e| {
                ErrorReport::new(ErrorCode::LocalIo, format!("cannot read {}: {e}", local.display()))
            })?;
            let bytes = conn
                .execute(job, move |engine, cancel| engine.put(&remote, &data, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::reply(Reply::Transferred { bytes }))
        }

        Verb::Rm { path, recursive } => {
            conn.execute(job, move |engine, cancel| engine.rm(&path, recursive, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Mkdir { path } => {
            conn.execute(job, move |engine, cancel| engine.mkdir(&path, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Rmdir { path } => {
            conn.execute(job, move |engine, cancel| engine.rmdir(&path, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Stat { path } => {
            let entry = conn
                .execute(job, move |engine, cancel| engine.stat(&path, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::reply(Reply::Stat(entry)))
        }

        Verb::Cp { src, dest, recursive } => {
            let tally = conn
                .execute(job, move |engine, cancel| engine.cp(&src, &dest, recursive, cancel))
                .await
                .map_err(failed)?;
            Ok(files(tally))
        }

        Verb::Mv { src, dest } => {
            conn.execute(job, move |engine, cancel| engine.mv(&src, &dest, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Touch { path } => {
            conn.execute(job, move |engine, cancel| engine.touch(&path, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::ok())
        }

        Verb::Format => {
            let core = &conn.info().core;
            let Some(script) = format_script(core) else {
                return Err(ErrorReport::new(
                    ErrorCode::Usage,
                    format!("formatting is not supported on {core}"),
                ));
            };
            conn.execute(job, move |engine, cancel| engine.format(script, cancel))
                .await
                .map_err(failed)?;
            info!(%port, "filesystem formatted");
            Ok(Status::ok())
        }

        Verb::Getdir { remote, local } => {
            let items = conn
                .execute(job, move |engine, cancel| engine.get_tree(&remote, cancel))
                .await
                .map_err(failed)?;
            Ok(files(tree::write_tree(&local, items).await?))
        }

        Verb::Putdir { local, remote } => {
            let items = tree::read_tree(local).await?;
            let tally = conn
                .execute(job, move |engine, cancel| engine.put_tree(&remote, &items, cancel))
                .await
                .map_err(failed)?;
            Ok(files(tally))
        }

        Verb::Mem => {
            let mem =
                conn.execute(job, |engine, cancel| engine.mem(cancel)).await.map_err(failed)?;
            Ok(Status::reply(Reply::Mem(mem)))
        }

        Verb::Df => {
            let root = conn.info().root();
            let df = conn
                .execute(job, move |engine, cancel| engine.df(root, cancel))
                .await
                .map_err(failed)?;
            Ok(Status::reply(Reply::Df(df)))
        }

        other => Err(ErrorReport::new(
            ErrorCode::AgentInternal,
            format!("`{}` is not a board command", other.name()),
        )),
    }
}

fn files(tally: Tally) -> Status {
    Status::reply(Reply::Files { files: tally.files, bytes: tally.bytes })
}

pub(super) async fn read_script(path: &Path) -> Result<String, ErrorReport> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ErrorReport::new(ErrorCode::LocalIo, format!("cannot read {}: {e}", path.display()))
    })
}

/// Send a program and answer once it is running. The board stays locked
/// until the program finishes or is stopped; other requests are refused
/// with `board_busy` meanwhile, or queue when they asked to wait.
async fn run_detached(
    ctx: &ListenCtx,
    conn: Arc<Connection>,
    job: Job,
    path: &Path,
) -> Result<Status, ErrorReport> {
    let code = read_script(path).await?;
    let port = conn.port().clone();
    let lease = conn.acquire(job).await.map_err(|e| ctx.board_error(&port, e))?;
    lease.detach();

    let (started_tx, started_rx) = oneshot::channel();
    let worker = Arc::clone(&conn);
    let work_port = port.clone();
    tokio::spawn(async move {
        let log_port = work_port.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            lease.run(move |engine, cancel| {
                let started = engine.start(code.as_bytes());
                let _ = started_tx.send(started.as_ref().map(|_| ()).map_err(|e| e.report(&log_port)));
                started?;
                let mut console = LogConsole::new(log_port, cancel);
                engine.follow(&mut console, None)
            })
        })
        .await;
        match worker.settle(outcome) {
            Ok(stderr) if stderr.is_empty() => info!(port = %work_port, "detached program finished"),
            Ok(stderr) => warn!(port = %work_port, traceback = %stderr.trim(), "detached program raised"),
            Err(e) => warn!(port = %work_port, error = %e, "detached program ended"),
        }
    });

    match started_rx.await {
        Ok(Ok(())) => {
            info!(%port, path = %path.display(), "program started detached");
            Ok(Status::reply(Reply::Detached { port }))
        }
        Ok(Err(report)) => Err(report),
        Err(_) => Err(ErrorReport::new(ErrorCode::AgentInternal, "detached run ended before starting")),
    }
}

/// Interrupt a program left running by `run --detach`.
pub(super) fn stop(ctx: &ListenCtx, target: &Target, tx: &FrameTx) -> Result<Status, ErrorReport> {
    let resolution = target::resolve_target(ctx, target)?;
    let stopped = ctx.connections.get(&resolution.port).is_some_and(|conn| conn.stop_detached());
    if stopped {
        info!(port = %resolution.port, "stopping detached program");
    } else {
        let _ = tx.send(Frame::Stderr(format!(
            "nothing detached is running on {}\n",
            resolution.port
        )));
    }
    Ok(Status::ok())
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
