// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use mpr_core::Port;
use mpr_wire::PortEntry;
use parking_lot::Mutex;

use super::PortOpener;
use crate::repl::fake::FakeBoard;
use crate::repl::{OpenError, Transport};

/// Opener over simulated boards; ports without a board are "not found".
#[derive(Default)]
pub(crate) struct FakeOpener {
    boards: Mutex<BTreeMap<Port, FakeBoard>>,
    busy: Mutex<BTreeSet<Port>>,
    opens: Mutex<Vec<Port>>,
}

impl FakeOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Plug `board` in at `port`, replacing whatever was there.
    pub(crate) fn plug(&self, port: &str, board: FakeBoard) -> FakeBoard {
        self.boards.lock().insert(Port::new(port), board.clone());
        board
    }

    /// Another program holds `port`.
    pub(crate) fn hold_elsewhere(&self, port: &str) {
        self.busy.lock().insert(Port::new(port));
    }

    pub(crate) fn opens(&self) -> Vec<Port> {
        self.opens.lock().clone()
    }
}

impl PortOpener for FakeOpener {
    fn open(&self, port: &Port) -> Result<Box<dyn Transport>, OpenError> {
        if self.busy.lock().contains(port) {
            return Err(OpenError::Busy(port.clone()));
        }
        let board = self.boards.lock().get(port).cloned();
        match board {
            Some(board) if !board.is_unplugged() => {
                self.opens.lock().push(port.clone());
                Ok(Box::new(board))
            }
            _ => Err(OpenError::NotFound(port.clone())),
        }
    }

    fn list(&self) -> io::Result<Vec<PortEntry>> {
        Ok(self
            .boards
            .lock()
            .iter()
            .filter(|(_, b)| !b.is_unplugged())
            .map(|(port, _)| PortEntry {
                port: port.clone(),
                description: "2e8a:0005 Board in FS mode".to_string(),
                connected: false,
            })
            .collect())
    }
}
