// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live connections to boards.
//!
//! A [`Connection`] owns one board's [`ReplEngine`] behind an async mutex.
//! The mutex is the execution lock: every piece of work on the board holds
//! it for its whole duration, and waiters are served in arrival order.
//! Interactive work additionally marks the connection as leased, and a
//! detached program marks it as detached. Either way other requests fail
//! fast with `board_busy` instead of queueing behind work that may last
//! for hours, unless they ask to wait.

mod table;

#[cfg(test)]
pub(crate) mod fake;

pub use table::{ConnectError, ConnectionTable, PortOpener, SerialOpener, MAX_CONNECTIONS};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mpr_core::{BoardInfo, ErrorCode, ErrorReport, Port, SessionId};
use mpr_wire::ConnectionEntry;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::repl::{Cancel, ReplEngine, ReplError, Timeouts, Transport};

pub type BoardEngine = ReplEngine<Box<dyn Transport>>;

/// Who is using a board right now.
#[derive(Debug, Clone)]
pub struct Holder {
    pub sid: SessionId,
    pub verb: &'static str,
    pub leased: bool,
    /// A program left running by `run --detach`
    pub detached: bool,
    pub cancel: Cancel,
}

/// Description of a unit of work on a board.
#[derive(Debug, Clone)]
pub struct Job {
    pub sid: SessionId,
    pub verb: &'static str,
    /// Interactive takeover; other sessions see the board as busy
    pub leased: bool,
    /// Queue behind a lease instead of failing
    pub wait: bool,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{port} is in use by session {holder}")]
    Busy { port: Port, holder: SessionId },

    #[error("{port} is running a detached program from session {holder} (`mpr stop` interrupts it)")]
    Detached { port: Port, holder: SessionId },

    #[error("{0} is no longer connected")]
    Closed(Port),

    #[error(transparent)]
    Repl(#[from] ReplError),

    #[error("board task failed: {0}")]
    Join(String),
}

impl ExecError {
    pub fn report(&self, port: &Port) -> ErrorReport {
        match self {
            ExecError::Busy { .. } | ExecError::Detached { .. } => {
                ErrorReport::new(ErrorCode::BoardBusy, self.to_string())
            }
            ExecError::Closed(_) => ErrorReport::new(ErrorCode::DeviceNotFound, self.to_string()),
            ExecError::Repl(e) => e.report(port),
            ExecError::Join(_) => ErrorReport::new(ErrorCode::AgentInternal, self.to_string()),
        }
    }

    pub fn is_device_gone(&self) -> bool {
        match self {
            ExecError::Repl(e) => e.is_device_gone(),
            ExecError::Closed(_) => true,
            _ => false,
        }
    }
}

pub struct Connection {
    port: Port,
    info: BoardInfo,
    engine: Arc<tokio::sync::Mutex<BoardEngine>>,
    holder: Arc<Mutex<Option<Holder>>>,
    dead: AtomicBool,
    raw_paste: Mutex<Option<bool>>,
    connected_at: DateTime<Utc>,
    last_used: Mutex<Instant>,
}

impl Connection {
    /// Handshake with a freshly opened board: identify it, then park it at
    /// the raw prompt.
    pub async fn open(
        port: Port,
        transport: Box<dyn Transport>,
        timeouts: Timeouts,
    ) -> Result<Self, ReplError> {
        let (engine, info) = tokio::task::spawn_blocking(move || {
            let mut engine = ReplEngine::with_timeouts(transport, timeouts);
            let info = engine.board_info(&Cancel::new())?;
            engine.enter_raw(false)?;
            Ok::<_, ReplError>((engine, info))
        })
        .await
        .map_err(|e| ReplError::Desync(format!("handshake task failed: {e}")))??;

        Ok(Self {
            port,
            info,
            engine: Arc::new(tokio::sync::Mutex::new(engine)),
            holder: Arc::new(Mutex::new(None)),
            dead: AtomicBool::new(false),
            raw_paste: Mutex::new(None),
            connected_at: Utc::now(),
            last_used: Mutex::new(Instant::now()),
        })
    }

    pub fn port(&self) -> &Port {
        &self.port
    }

    pub fn info(&self) -> &BoardInfo {
        &self.info
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        if !self.dead.swap(true, Ordering::SeqCst) {
            warn!(port = %self.port, "board connection lost");
        }
    }

    pub fn holder(&self) -> Option<Holder> {
        self.holder.lock().clone()
    }

    /// Session holding an interactive lease, if any.
    pub fn leased_by(&self) -> Option<SessionId> {
        self.holder.lock().as_ref().filter(|h| h.leased).map(|h| h.sid.clone())
    }

    /// Session whose lease or detached program keeps the board, if any.
    pub fn blocked_by(&self) -> Option<SessionId> {
        self.holder.lock().as_ref().filter(|h| h.leased || h.detached).map(|h| h.sid.clone())
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    /// Take the execution lock, waiting in line behind earlier callers.
    pub async fn acquire(&self, job: Job) -> Result<Lease, ExecError> {
        if self.is_dead() {
            return Err(ExecError::Closed(self.port.clone()));
        }
        if !job.wait {
            if let Some(err) = self.refusal() {
                return Err(err);
            }
        }
        let guard = Arc::clone(&self.engine).lock_owned().await;
        if self.is_dead() {
            return Err(ExecError::Closed(self.port.clone()));
        }
        Ok(self.install(job, guard))
    }

    fn refusal(&self) -> Option<ExecError> {
        let holder = self.holder.lock();
        let holder = holder.as_ref()?;
        let port = self.port.clone();
        if holder.leased {
            Some(ExecError::Busy { port, holder: holder.sid.clone() })
        } else if holder.detached {
            Some(ExecError::Detached { port, holder: holder.sid.clone() })
        } else {
            None
        }
    }

    /// Take the execution lock only if nobody holds or waits for it.
    pub fn try_acquire(&self, job: Job) -> Option<Lease> {
        if self.is_dead() {
            return None;
        }
        let guard = Arc::clone(&self.engine).try_lock_owned().ok()?;
        Some(self.install(job, guard))
    }

    fn install(&self, job: Job, guard: OwnedMutexGuard<BoardEngine>) -> Lease {
        let cancel = Cancel::new();
        debug!(port = %self.port, sid = %job.sid, verb = job.verb, "board acquired");
        *self.holder.lock() = Some(Holder {
            sid: job.sid,
            verb: job.verb,
            leased: job.leased,
            detached: false,
            cancel: cancel.clone(),
        });
        *self.last_used.lock() = Instant::now();
        Lease { guard, holder: Arc::clone(&self.holder), cancel }
    }

    /// Run blocking board work under the execution lock.
    ///
    /// Dropping the returned future (the client went away) cancels the
    /// work; the engine then interrupts the board and releases the lock.
    pub async fn execute<R, F>(&self, job: Job, f: F) -> Result<R, ExecError>
    where
        R: Send + 'static,
        F: FnOnce(&mut BoardEngine, &Cancel) -> Result<R, ReplError> + Send + 'static,
    {
        let lease = self.acquire(job).await?;
        let mut on_drop = CancelOnDrop(Some(lease.cancel.clone()));
        let outcome = tokio::task::spawn_blocking(move || lease.run(f)).await;
        on_drop.disarm();
        self.settle(outcome)
    }

    /// Record what a finished piece of work says about the board.
    pub fn settle<R>(&self, outcome: Result<Finished<R>, JoinError>) -> Result<R, ExecError> {
        *self.last_used.lock() = Instant::now();
        let finished = outcome.map_err(|e| ExecError::Join(e.to_string()))?;
        if finished.raw_paste.is_some() {
            *self.raw_paste.lock() = finished.raw_paste;
        }
        match finished.result {
            Err(e) if e.is_device_gone() => {
                self.mark_dead();
                Err(ExecError::Repl(e))
            }
            other => other.map_err(ExecError::from),
        }
    }

    /// Cancel a detached program still running on the board. Requests
    /// arriving while it winds down queue instead of being refused.
    pub fn stop_detached(&self) -> bool {
        match self.holder.lock().as_mut() {
            Some(h) if h.detached => {
                h.detached = false;
                h.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Stop using the board: cancel current work, wait for the lock, then
    /// hand the board back to its friendly REPL.
    pub async fn close(&self, timeout: Duration) {
        if let Some(holder) = self.holder() {
            holder.cancel.cancel();
        }
        let was_dead = self.dead.swap(true, Ordering::SeqCst);
        if was_dead {
            return;
        }
        let Ok(mut guard) = tokio::time::timeout(timeout, Arc::clone(&self.engine).lock_owned()).await
        else {
            warn!(port = %self.port, "board still busy at close");
            return;
        };
        let port = self.port.clone();
        let exited = tokio::task::spawn_blocking(move || guard.exit_raw()).await;
        if let Ok(Err(e)) = exited {
            debug!(port = %port, error = %e, "leaving raw mode on close failed");
        }
    }

    pub fn entry(&self) -> ConnectionEntry {
        let holder = self.holder();
        ConnectionEntry {
            port: self.port.clone(),
            info: self.info.clone(),
            busy: holder.as_ref().map(|h| h.verb.to_string()),
            leased_by: holder.filter(|h| h.leased).map(|h| h.sid),
            dead: self.is_dead(),
            raw_paste: *self.raw_paste.lock(),
            connected_at: self.connected_at.to_rfc3339(),
        }
    }
}

/// Exclusive use of a board. Dropping it clears the holder and then
/// releases the execution lock.
pub struct Lease {
    guard: OwnedMutexGuard<BoardEngine>,
    holder: Arc<Mutex<Option<Holder>>>,
    cancel: Cancel,
}

/// Result of work run under a [`Lease`].
pub struct Finished<R> {
    pub result: Result<R, ReplError>,
    pub raw_paste: Option<bool>,
}

impl Lease {
    pub fn cancel(&self) -> &Cancel {
        &self.cancel
    }

    /// Mark the held work as a detached program.
    pub fn detach(&self) {
        if let Some(holder) = self.holder.lock().as_mut() {
            holder.detached = true;
        }
    }

    /// Run `f` on the board. Blocks; call from the blocking pool.
    pub fn run<R>(
        mut self,
        f: impl FnOnce(&mut BoardEngine, &Cancel) -> Result<R, ReplError>,
    ) -> Finished<R> {
        let cancel = self.cancel.clone();
        let result = f(&mut self.guard, &cancel);
        Finished { result, raw_paste: self.guard.raw_paste() }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        *self.holder.lock() = None;
    }
}

/// Cancels work whose requester stopped waiting for it.
struct CancelOnDrop(Option<Cancel>);

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
