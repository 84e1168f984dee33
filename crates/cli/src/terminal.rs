// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw keyboard mode for `mpr repl`.

use std::io::IsTerminal;

use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};

/// Leaves the REPL and returns the board to other sessions.
pub const EXIT_KEY: u8 = 0x1d;
pub const EXIT_KEY_NAME: &str = "Ctrl-]";

/// Puts stdin in raw mode; the previous settings come back on drop.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    /// `None` when stdin is not a terminal (piped input passes through).
    pub fn enable() -> nix::Result<Option<Self>> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        let saved = tcgetattr(&stdin)?;
        let mut raw = saved.clone();
        cfmakeraw(&mut raw);
        tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(Some(Self { saved }))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = tcsetattr(std::io::stdin(), SetArg::TCSANOW, &self.saved);
    }
}

/// Split keyboard bytes at the exit key.
///
/// Returns the bytes to forward and whether the exit key was pressed.
pub fn split_exit(bytes: &[u8]) -> (&[u8], bool) {
    match bytes.iter().position(|&b| b == EXIT_KEY) {
        Some(at) => (&bytes[..at], true),
        None => (bytes, false),
    }
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
