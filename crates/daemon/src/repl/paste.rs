// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw-paste: code transfer under device flow control.
//!
//! After `Ctrl-E A Ctrl-A` the board answers `R\x01` and a little-endian
//! window increment. The host may have at most two increments of data
//! outstanding; each `\x01` from the board grants one more. A `\x04` from
//! the board ends the transfer early.

use super::{ReplEngine, ReplError, Transport, CTRL_A, CTRL_D, CTRL_E};

const REQUEST: [u8; 3] = [CTRL_E, b'A', CTRL_A];
const WINDOW_GRANT: u8 = 0x01;

impl<T: Transport> ReplEngine<T> {
    /// Send `code` using raw-paste.
    ///
    /// `Ok(false)` means the board does not speak raw-paste; it is left at
    /// the raw prompt, ready for a standard transfer.
    pub(super) fn send_raw_paste(&mut self, code: &[u8]) -> Result<bool, ReplError> {
        let prompt = self.timeouts().prompt;
        self.write(&REQUEST)?;
        let reply = self.read_exact(2, prompt, "raw-paste reply")?;
        let increment = match reply.as_slice() {
            b"R\x01" => {
                let bytes = self.read_exact(2, prompt, "raw-paste window size")?;
                usize::from(u16::from_le_bytes([bytes[0], bytes[1]]))
            }
            b"R\x00" => return Ok(false),
            // Firmware without raw-paste reprints the raw banner.
            [b'r', ..] => {
                self.read_until(b">", prompt, "raw prompt")?;
                return Ok(false);
            }
            other => {
                return Err(ReplError::TransferCorrupted(format!(
                    "unexpected raw-paste reply {other:?}"
                )))
            }
        };
        if increment == 0 {
            return Err(ReplError::TransferCorrupted("board offered an empty window".to_string()));
        }

        let mut window = 2 * increment;
        let mut sent = 0;
        while sent < code.len() {
            while window == 0 || self.has_input()? {
                match self.read_byte(prompt, "flow control")? {
                    WINDOW_GRANT => window += increment,
                    CTRL_D => {
                        self.write(&[CTRL_D])?;
                        return Ok(true);
                    }
                    other => {
                        return Err(ReplError::TransferCorrupted(format!(
                            "unexpected flow control byte 0x{other:02x}"
                        )))
                    }
                }
            }
            let n = window.min(code.len() - sent);
            self.write(&code[sent..sent + n])?;
            sent += n;
            window -= n;
        }

        self.write(&[CTRL_D])?;
        // Grants still in flight arrive before the acknowledgement.
        self.read_until(&[CTRL_D], prompt, "end of data acknowledgement")?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "paste_tests.rs"]
mod tests;
