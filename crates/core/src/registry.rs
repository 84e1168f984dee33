// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: which boards each client session refers to.
//!
//! Each session has at most one foreground (FG) board and any number of
//! background (BG) boards. A port is never FG and BG of the same session at
//! once. Promoting a port to FG demotes the previous FG to BG rather than
//! dropping it.
//!
//! The registry is plain data. The agent wraps it in a single lock; nothing
//! here does I/O.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::id::{Port, SessionId};

/// Board references held by one session.
#[derive(Debug, Clone)]
pub struct Session {
    fg: Option<Port>,
    bg: BTreeSet<Port>,
    last_access: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self { fg: None, bg: BTreeSet::new(), last_access: now }
    }

    pub fn fg(&self) -> Option<&Port> {
        self.fg.as_ref()
    }

    pub fn bg(&self) -> impl Iterator<Item = &Port> {
        self.bg.iter()
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// True if the session references `port` as FG or BG.
    pub fn references(&self, port: &Port) -> bool {
        self.fg.as_ref() == Some(port) || self.bg.contains(port)
    }

    pub fn is_empty(&self) -> bool {
        self.fg.is_none() && self.bg.is_empty()
    }

    fn set_fg(&mut self, port: Port) {
        if self.fg.as_ref() == Some(&port) {
            return;
        }
        self.bg.remove(&port);
        if let Some(old) = self.fg.replace(port) {
            self.bg.insert(old);
        }
    }

    fn add_bg(&mut self, port: Port) {
        if self.fg.as_ref() != Some(&port) {
            self.bg.insert(port);
        }
    }

    fn remove(&mut self, port: &Port) -> bool {
        if self.fg.as_ref() == Some(port) {
            self.fg = self.bg.pop_first();
            true
        } else {
            self.bg.remove(port)
        }
    }
}

/// Serializable snapshot of one session for `status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub sid: SessionId,
    pub fg: Option<Port>,
    pub bg: Vec<Port>,
    /// Seconds since the session last issued a request
    pub idle_secs: u64,
}

/// What `remove_port` changed, so callers can log promotions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub sid: SessionId,
    /// The BG port promoted to FG, if the removed port was FG
    pub promoted: Option<Port>,
}

/// Table of all sessions known to the agent.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session, creating it on first reference, and mark it active.
    pub fn get_or_create(&mut self, sid: &SessionId, now: Instant) -> &Session {
        let session = self.sessions.entry(sid.clone()).or_insert_with(|| Session::new(now));
        session.last_access = now;
        session
    }

    pub fn get(&self, sid: &SessionId) -> Option<&Session> {
        self.sessions.get(sid)
    }

    /// Make `port` the session's FG, demoting any previous FG to BG.
    pub fn set_fg(&mut self, sid: &SessionId, port: Port, now: Instant) {
        let session = self.sessions.entry(sid.clone()).or_insert_with(|| Session::new(now));
        session.last_access = now;
        session.set_fg(port);
    }

    /// Attach `port` as BG. A port that is already the session's FG stays FG.
    pub fn add_bg(&mut self, sid: &SessionId, port: Port, now: Instant) {
        let session = self.sessions.entry(sid.clone()).or_insert_with(|| Session::new(now));
        session.last_access = now;
        session.add_bg(port);
    }

    /// Drop `port` from one session.
    ///
    /// Removing the FG promotes the lowest-ordered BG port, if any. Returns
    /// false when the session did not reference the port.
    pub fn remove(&mut self, sid: &SessionId, port: &Port) -> bool {
        self.sessions.get_mut(sid).is_some_and(|s| s.remove(port))
    }

    /// Drop `port` from every session (connection closed or device gone).
    pub fn remove_port(&mut self, port: &Port) -> Vec<Detached> {
        let mut detached = Vec::new();
        for (sid, session) in self.sessions.iter_mut() {
            let was_fg = session.fg.as_ref() == Some(port);
            if session.remove(port) {
                let promoted = if was_fg { session.fg.clone() } else { None };
                detached.push(Detached { sid: sid.clone(), promoted });
            }
        }
        detached.sort_by(|a, b| a.sid.cmp(&b.sid));
        detached
    }

    /// Sessions referencing `port` as FG or BG.
    pub fn sessions_using(&self, port: &Port) -> Vec<SessionId> {
        let mut sids: Vec<_> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.references(port))
            .map(|(sid, _)| sid.clone())
            .collect();
        sids.sort();
        sids
    }

    /// Every port referenced by at least one session.
    pub fn referenced_ports(&self) -> BTreeSet<Port> {
        self.sessions
            .values()
            .flat_map(|s| s.fg.iter().chain(s.bg.iter()))
            .cloned()
            .collect()
    }

    pub fn view(&self, sid: &SessionId, now: Instant) -> Option<SessionView> {
        self.sessions.get(sid).map(|s| view_of(sid, s, now))
    }

    /// Snapshot of all sessions, ordered by SID.
    pub fn list(&self, now: Instant) -> Vec<SessionView> {
        let mut views: Vec<_> =
            self.sessions.iter().map(|(sid, s)| view_of(sid, s, now)).collect();
        views.sort_by(|a, b| a.sid.cmp(&b.sid));
        views
    }

    /// Remove sessions whose owner is gone, or that are empty and idle.
    ///
    /// `is_alive` reports whether the client behind a SID still exists.
    pub fn collect_garbage(
        &mut self,
        now: Instant,
        idle_limit: Duration,
        is_alive: impl Fn(&SessionId) -> bool,
    ) -> Vec<SessionId> {
        let mut removed = Vec::new();
        self.sessions.retain(|sid, session| {
            let idle = now.saturating_duration_since(session.last_access) > idle_limit;
            let keep = is_alive(sid) && !(session.is_empty() && idle);
            if !keep {
                removed.push(sid.clone());
            }
            keep
        });
        removed.sort();
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

fn view_of(sid: &SessionId, session: &Session, now: Instant) -> SessionView {
    SessionView {
        sid: sid.clone(),
        fg: session.fg.clone(),
        bg: session.bg.iter().cloned().collect(),
        idle_secs: now.saturating_duration_since(session.last_access).as_secs(),
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
