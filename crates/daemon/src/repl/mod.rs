// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MicroPython raw REPL protocol.
//!
//! [`ReplEngine`] owns the transport to one board and drives it between the
//! friendly REPL and the machine-oriented raw REPL. All methods block; the
//! connection layer runs them on the blocking thread pool while holding the
//! board's execution lock.

mod engine;
mod fs;
mod paste;
mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::{ReplEngine, ReplState, Timeouts};
pub use fs::{format_script, Tally, TreeItem, GET_CHUNK};
pub use transport::{list_serial_ports, OpenError, SerialTransport, Transport, POLL_INTERVAL};

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mpr_core::{ErrorCode, ErrorReport, Port};
use thiserror::Error;

pub(crate) const CTRL_A: u8 = 0x01;
pub(crate) const CTRL_B: u8 = 0x02;
pub(crate) const CTRL_C: u8 = 0x03;
pub(crate) const CTRL_D: u8 = 0x04;
pub(crate) const CTRL_E: u8 = 0x05;

/// Prefix device-side scripts print in front of an `OSError`.
pub(crate) const ERROR_PREFIX: &str = "__ERROR__:";

#[derive(Debug, Error)]
pub enum ReplError {
    #[error("could not enter raw mode")]
    EnterRaw,

    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: &'static str },

    #[error("protocol out of sync: {0}")]
    Desync(String),

    #[error("transfer corrupted: {0}")]
    TransferCorrupted(String),

    #[error("device disconnected: {0}")]
    DeviceGone(#[source] io::Error),

    /// Code on the board raised; carries the traceback
    #[error("{0}")]
    Remote(String),

    /// Interrupted by the client
    #[error("interrupted")]
    Interrupted,
}

impl ReplError {
    pub fn is_device_gone(&self) -> bool {
        matches!(self, ReplError::DeviceGone(_))
    }

    pub fn report(&self, port: &Port) -> ErrorReport {
        let code = match self {
            ReplError::EnterRaw | ReplError::Timeout { .. } | ReplError::Desync(_) => {
                ErrorCode::ProtocolTimeout
            }
            ReplError::TransferCorrupted(_) => ErrorCode::TransferCorrupted,
            ReplError::DeviceGone(_) => ErrorCode::DeviceNotFound,
            ReplError::Remote(_) => ErrorCode::RemoteException,
            ReplError::Interrupted => ErrorCode::Interrupted,
        };
        match self {
            ReplError::Remote(traceback) => ErrorReport::new(code, traceback.trim_end()),
            ReplError::Interrupted => ErrorReport::new(code, "interrupted"),
            other => ErrorReport::new(code, format!("{port}: {other}")),
        }
    }
}

/// Cancellation flag shared between a request and the blocking work it started.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Input waiting to be delivered to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    None,
    Data(Vec<u8>),
    /// Ctrl-C for the running program
    Interrupt,
    /// Client let go of the board
    Exit,
}

/// Where the engine sends program output and finds keyboard input.
pub trait Console {
    fn stdout(&mut self, bytes: &[u8]);

    fn poll_input(&mut self) -> ConsoleInput {
        ConsoleInput::None
    }

    fn cancelled(&self) -> bool {
        false
    }
}

/// Console that collects output for scripts the agent runs itself.
pub struct Capture {
    bytes: Vec<u8>,
    cancel: Cancel,
}

impl Capture {
    pub fn new(cancel: &Cancel) -> Self {
        Self { bytes: Vec::new(), cancel: cancel.clone() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Console for Capture {
    fn stdout(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
