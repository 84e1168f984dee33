// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers shared by the agent and its clients.

crate::define_name! {
    /// Logical client session.
    ///
    /// One terminal maps to one session: the client derives the value from
    /// `MPR_SESSION` or, failing that, from the pid of its invoking shell.
    pub struct SessionId;
}

crate::define_name! {
    /// OS device path of a serial-attached board (e.g. `/dev/ttyACM0`, `COM3`).
    ///
    /// The primary key for boards and connections.
    pub struct Port;
}

impl SessionId {
    /// The process id encoded in this session, when it was derived from one.
    pub fn pid(&self) -> Option<u32> {
        self.0.strip_prefix("pid-").and_then(|p| p.parse().ok())
    }

    /// Session derived from the pid of the invoking process.
    pub fn from_pid(pid: u32) -> Self {
        Self(format!("pid-{pid}"))
    }
}

impl Port {
    /// Platform-normalised form used as a table key.
    ///
    /// Windows port names are case-insensitive (`com3` == `COM3`).
    pub fn normalized(&self) -> Port {
        let upper = self.0.to_ascii_uppercase();
        if upper.len() > 3 && upper.starts_with("COM") && upper[3..].chars().all(|c| c.is_ascii_digit()) {
            Port(upper)
        } else {
            self.clone()
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
